// src/wallet/mod.rs
pub mod address;
pub mod cell;
pub mod contract;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use address::{derive_address, same_address, wallet_address, wallet_state_init, Address, StateInit, WalletIdentity};
pub use contract::WalletVersion;

/// Workchain every wallet is deployed to
pub const WORKCHAIN: i8 = 0;

/// Persisted description of one account in the extension
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub name: String,
    /// User-facing address as shown when the wallet was added
    pub address: String,
    /// Hex-encoded ed25519 public key
    pub public_key: String,
    pub version: WalletVersion,
    #[serde(default)]
    pub is_bounceable: bool,
    #[serde(default)]
    pub is_ledger: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_index: Option<u32>,
}

impl WalletState {
    pub fn identity(&self) -> Result<WalletIdentity> {
        WalletIdentity::from_hex(&self.public_key, self.version, WORKCHAIN)
    }
}

/// All wallets of one network plus the one currently selected
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountState {
    pub wallets: Vec<WalletState>,
    #[serde(default)]
    pub active_wallet: Option<String>,
}

impl AccountState {
    pub fn wallet(&self, address: &str) -> Option<&WalletState> {
        self.wallets.iter().find(|w| same_address(&w.address, address))
    }

    pub fn active(&self) -> Option<&WalletState> {
        self.active_wallet.as_deref().and_then(|address| self.wallet(address))
    }
}

/// Serializes a state init to a base64 BOC (provided by the cell library)
pub trait StateInitEncoder: Send + Sync {
    fn encode_state_init(&self, init: &StateInit) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(name: &str, address: &str) -> WalletState {
        WalletState {
            name: name.to_string(),
            address: address.to_string(),
            public_key: "00".repeat(32),
            version: WalletVersion::V4R2,
            is_bounceable: false,
            is_ledger: false,
            ledger_index: None,
        }
    }

    #[test]
    fn test_stored_shape() {
        let state: WalletState = serde_json::from_str(
            r#"{"name":"Ledger 1","address":"EQx","publicKey":"ab","version":"v4R2","isBounceable":false,"isLedger":true,"ledgerIndex":0}"#,
        )
        .unwrap();
        assert!(state.is_ledger);
        assert_eq!(state.ledger_index, Some(0));
        assert_eq!(state.version, WalletVersion::V4R2);
    }

    #[test]
    fn test_active_wallet_lookup() {
        let account = AccountState {
            wallets: vec![wallet("A", "EQa"), wallet("B", "EQb")],
            active_wallet: Some("EQb".to_string()),
        };
        assert_eq!(account.active().unwrap().name, "B");
        assert!(account.wallet("EQc").is_none());
        assert!(AccountState::default().active().is_none());
    }

    #[test]
    fn test_identity_rejects_bad_key() {
        let mut state = wallet("A", "EQa");
        assert!(state.identity().is_ok());
        state.public_key = "zz".to_string();
        assert!(state.identity().is_err());
    }
}
