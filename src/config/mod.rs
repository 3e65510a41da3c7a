pub mod networks;

use serde::{Deserialize, Serialize};

pub use networks::{builtin_networks, select_network_config, NetworkConfig, MAINNET, TESTNET};

pub const NOTIFICATION_WIDTH: i32 = 380;
pub const NOTIFICATION_HEIGHT: i32 = 620;
pub const DEFAULT_BRIDGE_PORT: u16 = 8547;

/// Geometry and entry page of the approval popup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopupConfig {
    pub width: i32,
    pub height: i32,
    /// Extension page the popup routes are appended to, e.g. `index.html#/send`
    pub index_page: String,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            width: NOTIFICATION_WIDTH,
            height: NOTIFICATION_HEIGHT,
            index_page: "index.html".to_string(),
        }
    }
}

/// Broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Local port of the dApp bridge websocket
    pub bridge_port: u16,
    /// Directory used by the file-backed store
    pub storage_dir: String,
    pub popup: PopupConfig,
    pub networks: Vec<NetworkConfig>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bridge_port: DEFAULT_BRIDGE_PORT,
            storage_dir: default_storage_dir(),
            popup: PopupConfig::default(),
            networks: builtin_networks(),
        }
    }
}

impl BrokerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bridge_port: std::env::var("TONMASK_BRIDGE_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bridge_port),
            storage_dir: std::env::var("TONMASK_STORAGE_DIR")
                .unwrap_or(defaults.storage_dir),
            popup: PopupConfig {
                index_page: std::env::var("TONMASK_INDEX_PAGE")
                    .unwrap_or(defaults.popup.index_page),
                ..defaults.popup
            },
            networks: defaults.networks,
        }
    }

    pub fn network(&self, name: &str) -> crate::error::Result<&NetworkConfig> {
        select_network_config(name, &self.networks)
    }
}

fn default_storage_dir() -> String {
    let home_dir = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    format!("{home_dir}/.tonmask")
}
