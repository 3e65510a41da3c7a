use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{BrokerConfig, MAINNET};
use crate::error::{BrokerError, Result};
use crate::wallet::{same_address, AccountState};

/// Authorization a dApp origin holds on one network
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DAppAccess {
    pub connect: bool,
    /// Addresses of the wallets exposed to the origin, most recent first
    pub wallets: Vec<String>,
}

/// Origin -> access map of one network
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Connections(pub BTreeMap<String, DAppAccess>);

impl Connections {
    pub fn wallets_by_origin(&self, origin: &str) -> Vec<String> {
        self.0
            .get(origin)
            .filter(|access| access.connect)
            .map(|access| access.wallets.clone())
            .unwrap_or_default()
    }

    /// Expose `address` to `origin`, moving it to the front if already present
    pub fn grant_dapp_access(mut self, origin: &str, address: &str) -> Self {
        let access = self.0.entry(origin.to_string()).or_default();
        access.connect = true;
        access.wallets.retain(|w| !same_address(w, address));
        access.wallets.insert(0, address.to_string());
        self
    }

    pub fn revoke_all_dapp_access(mut self, origin: &str) -> Self {
        self.0.remove(origin);
        self
    }
}

/// Extension storage the broker reads and writes
#[async_trait]
pub trait BrowserStore: Send + Sync {
    /// Name of the active network
    async fn network(&self) -> Result<String>;

    async fn set_network(&self, network: &str) -> Result<()>;

    async fn account_state(&self, network: &str) -> Result<AccountState>;

    async fn set_account_state(&self, network: &str, state: &AccountState) -> Result<()>;

    async fn connections(&self, network: &str) -> Result<Connections>;

    async fn set_connections(&self, network: &str, connections: &Connections) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    network: Option<String>,
    accounts: HashMap<String, AccountState>,
    connections: HashMap<String, Connections>,
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrowserStore for MemoryStore {
    async fn network(&self) -> Result<String> {
        Ok(self.state.lock().network.clone().unwrap_or_else(|| MAINNET.to_string()))
    }

    async fn set_network(&self, network: &str) -> Result<()> {
        self.state.lock().network = Some(network.to_string());
        Ok(())
    }

    async fn account_state(&self, network: &str) -> Result<AccountState> {
        Ok(self.state.lock().accounts.get(network).cloned().unwrap_or_default())
    }

    async fn set_account_state(&self, network: &str, state: &AccountState) -> Result<()> {
        self.state.lock().accounts.insert(network.to_string(), state.clone());
        Ok(())
    }

    async fn connections(&self, network: &str) -> Result<Connections> {
        Ok(self.state.lock().connections.get(network).cloned().unwrap_or_default())
    }

    async fn set_connections(&self, network: &str, connections: &Connections) -> Result<()> {
        self.state.lock().connections.insert(network.to_string(), connections.clone());
        Ok(())
    }
}

/// JSON files under a storage directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(&config.storage_dir)
    }

    fn network_file_path(&self) -> PathBuf {
        self.dir.join("network.txt")
    }

    fn account_file_path(&self, network: &str) -> PathBuf {
        self.dir.join(format!("account_{network}.json"))
    }

    fn connections_file_path(&self, network: &str) -> PathBuf {
        self.dir.join(format!("connections_{network}.json"))
    }

    async fn ensure_storage_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            log::error!("Storage: failed to create directory {}: {}", self.dir.display(), e);
            BrokerError::Storage(format!("Cannot create {}: {}", self.dir.display(), e))
        })
    }

    /// Missing files read as the default value
    async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
        match tokio::fs::read_to_string(path).await {
            Ok(data) => serde_json::from_str(&data).map_err(|e| {
                log::error!("Storage: failed to parse {}: {}", path.display(), e);
                BrokerError::Storage(format!("Corrupt file {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => {
                log::error!("Storage: failed to read {}: {}", path.display(), e);
                Err(e.into())
            }
        }
    }

    async fn write_json<T: Serialize + Sync>(&self, path: &Path, value: &T) -> Result<()> {
        self.ensure_storage_dir().await?;
        let serialized = serde_json::to_string_pretty(value)
            .map_err(|e| BrokerError::Storage(format!("Failed to serialize: {}", e)))?;
        tokio::fs::write(path, serialized).await.map_err(|e| {
            log::error!("Storage: failed to write {}: {}", path.display(), e);
            BrokerError::from(e)
        })?;
        log::debug!("Storage: saved {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl BrowserStore for FileStore {
    async fn network(&self) -> Result<String> {
        match tokio::fs::read_to_string(self.network_file_path()).await {
            Ok(data) if !data.trim().is_empty() => Ok(data.trim().to_string()),
            Ok(_) => Ok(MAINNET.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(MAINNET.to_string()),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_network(&self, network: &str) -> Result<()> {
        self.ensure_storage_dir().await?;
        tokio::fs::write(self.network_file_path(), network).await?;
        log::info!("Storage: active network set to {}", network);
        Ok(())
    }

    async fn account_state(&self, network: &str) -> Result<AccountState> {
        Self::read_json(&self.account_file_path(network)).await
    }

    async fn set_account_state(&self, network: &str, state: &AccountState) -> Result<()> {
        self.write_json(&self.account_file_path(network), state).await
    }

    async fn connections(&self, network: &str) -> Result<Connections> {
        Self::read_json(&self.connections_file_path(network)).await
    }

    async fn set_connections(&self, network: &str, connections: &Connections) -> Result<()> {
        self.write_json(&self.connections_file_path(network), connections).await
    }
}
