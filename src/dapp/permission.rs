use super::DAppService;
use crate::error::{BrokerError, Result};
use crate::wallet::same_address;

impl DAppService {
    /// Wallets `origin` is connected to on the active network
    pub async fn check_base_dapp_permission(&self, origin: &str) -> Result<Vec<String>> {
        let network = self.store.network().await?;
        let wallets = self.store.connections(&network).await?.wallets_by_origin(origin);
        if wallets.is_empty() {
            log::warn!("DApp: {} has no connection on {}", origin, network);
            return Err(BrokerError::Unauthorized("Missing connected wallet".to_string()));
        }
        Ok(wallets)
    }

    /// Make one of `origin`'s wallets the active one, unless it already is
    pub async fn switch_active_address(&self, origin: &str) -> Result<()> {
        let _writes = self.store_writes.lock().await;
        let network = self.store.network().await?;
        let connected = self.store.connections(&network).await?.wallets_by_origin(origin);
        let mut account = self.store.account_state(&network).await?;

        let active_is_connected = account
            .active()
            .is_some_and(|active| connected.iter().any(|w| same_address(w, &active.address)));
        if active_is_connected {
            return Ok(());
        }

        let address = connected
            .iter()
            .find_map(|w| account.wallet(w).map(|state| state.address.clone()))
            .ok_or_else(|| BrokerError::Unauthorized("Missing wallet state".to_string()))?;

        log::info!("DApp: switching active wallet to {} for {}", address, origin);
        account.active_wallet = Some(address);
        self.store.set_account_state(&network, &account).await
    }
}
