use std::sync::LazyLock;
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};

pub const MAINNET: &str = "mainnet";
pub const TESTNET: &str = "testnet";

/// RPC endpoint and TON Connect chain id for a named network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub name: String,
    /// Chain id reported to TON Connect clients ("-239" mainnet, "-3" testnet)
    pub id: String,
    pub rpc_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

static BUILTIN_NETWORKS: LazyLock<Vec<NetworkConfig>> = LazyLock::new(|| {
    vec![
        NetworkConfig {
            name: MAINNET.to_string(),
            id: "-239".to_string(),
            rpc_url: "https://toncenter.com/api/v2/jsonRPC".to_string(),
            api_key: None,
        },
        NetworkConfig {
            name: TESTNET.to_string(),
            id: "-3".to_string(),
            rpc_url: "https://testnet.toncenter.com/api/v2/jsonRPC".to_string(),
            api_key: None,
        },
    ]
});

pub fn builtin_networks() -> Vec<NetworkConfig> {
    BUILTIN_NETWORKS.clone()
}

/// Pick the config for `network` out of `networks`
pub fn select_network_config<'a>(network: &str, networks: &'a [NetworkConfig]) -> Result<&'a NetworkConfig> {
    networks
        .iter()
        .find(|config| config.name == network)
        .ok_or_else(|| BrokerError::UnknownNetwork(network.to_string()))
}
