//! dApp-facing request flows.
//!
//! Every flow that needs the user follows the same shape: hold a pending
//! slot, register interest in the response, surface the popup and wait. The
//! slot and the subscriptions are guards, so an early return through `?`
//! still leaves the pending list and the bus clean.

mod connect;
mod permission;
pub mod types;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::approval::Approval;
use crate::bus::{EventBus, RequestId};
use crate::config::{select_network_config, BrokerConfig, NetworkConfig};
use crate::error::Result;
use crate::pending::{PendingRequest, PendingStore, RequestPayload};
use crate::platform::{ExtensionPlatform, WindowId};
use crate::popup::{PopupManager, PopupRoute};
use crate::storage::BrowserStore;
use crate::wallet::StateInitEncoder;

use types::{JettonParams, NftParams, TonConnectTransactionPayload, TransactionParams};

pub struct DAppService {
    store: Arc<dyn BrowserStore>,
    popups: Arc<PopupManager>,
    pending: PendingStore,
    bus: EventBus,
    encoder: Arc<dyn StateInitEncoder>,
    networks: Vec<NetworkConfig>,
    // Serializes read-modify-write sequences on the store
    store_writes: tokio::sync::Mutex<()>,
    close_listener: Mutex<Option<JoinHandle<()>>>,
}

impl DAppService {
    pub fn new(
        config: &BrokerConfig,
        platform: Arc<dyn ExtensionPlatform>,
        store: Arc<dyn BrowserStore>,
        encoder: Arc<dyn StateInitEncoder>,
    ) -> Self {
        let bus = EventBus::new();
        let popups = Arc::new(PopupManager::new(platform, bus.clone(), config.popup.clone()));
        Self {
            store,
            popups,
            pending: PendingStore::new(),
            bus,
            encoder,
            networks: config.networks.clone(),
            store_writes: tokio::sync::Mutex::new(()),
            close_listener: Mutex::new(None),
        }
    }

    /// Start forwarding popup window removals to waiting requests.
    ///
    /// Must run inside a tokio runtime before requests are served; without it
    /// a user closing the popup never reaches the waiters. Calling it again is
    /// a no-op while the listener is alive.
    pub fn start(&self) {
        let mut listener = self.close_listener.lock();
        if listener.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        log::info!("DApp: listening for popup removal");
        *listener = Some(self.popups.attach_close_listener());
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Requests the popup should list
    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    pub fn popups(&self) -> &Arc<PopupManager> {
        &self.popups
    }

    pub fn store(&self) -> &Arc<dyn BrowserStore> {
        &self.store
    }

    fn network_config(&self, network: &str) -> Result<&NetworkConfig> {
        select_network_config(network, &self.networks)
    }

    async fn request_approval<T: DeserializeOwned>(
        &self,
        request: PendingRequest,
        route: PopupRoute,
    ) -> Result<T> {
        let slot = self.pending.acquire(request)?;
        let approval = Approval::register(&self.bus, slot.id());
        let popup = self.popups.open(&route).await?;
        approval.wait(Some(popup)).await
    }

    /// Legacy provider transfer. Resolves with whatever the send screen reports.
    pub async fn send_transaction(
        &self,
        id: RequestId,
        origin: &str,
        params: TransactionParams,
    ) -> Result<Value> {
        self.check_base_dapp_permission(origin).await?;
        self.switch_active_address(origin).await?;

        let logo = self.popups.active_tab_logo().await;
        let route = PopupRoute::send(id, origin, &logo, &params)?;
        let request = PendingRequest::new(id, origin, &logo, RequestPayload::SendTransaction(params));
        self.request_approval(request, route).await
    }

    /// TON Connect transfer, shown in the pending list. Resolves with the signed BOC.
    pub async fn ton_connect_send(
        &self,
        id: RequestId,
        origin: &str,
        payload: TonConnectTransactionPayload,
    ) -> Result<String> {
        self.check_base_dapp_permission(origin).await?;
        self.switch_active_address(origin).await?;

        let logo = self.popups.active_tab_logo().await;
        let request = PendingRequest::new(id, origin, &logo, RequestPayload::TonConnectSend(payload));
        self.request_approval(request, PopupRoute::Notifications).await
    }

    /// Sign arbitrary hex data. Resolves with the hex signature.
    pub async fn sign_raw(&self, id: RequestId, origin: &str, data: String) -> Result<String> {
        self.check_base_dapp_permission(origin).await?;
        self.switch_active_address(origin).await?;

        let logo = self.popups.active_tab_logo().await;
        let route = PopupRoute::SignRaw {
            id,
            origin: origin.to_string(),
            logo: logo.clone(),
        };
        let request = PendingRequest::new(id, origin, &logo, RequestPayload::SignRaw(data));
        self.request_approval(request, route).await
    }

    pub async fn sign_personal(&self, id: RequestId, origin: &str, data: String) -> Result<String> {
        self.check_base_dapp_permission(origin).await?;
        self.switch_active_address(origin).await?;

        let logo = self.popups.active_tab_logo().await;
        let route = PopupRoute::SignPersonal {
            id,
            origin: origin.to_string(),
            logo: logo.clone(),
        };
        let request = PendingRequest::new(id, origin, &logo, RequestPayload::SignPersonal(data));
        self.request_approval(request, route).await
    }

    /// Ask the user to change the active network; persists it once approved
    pub async fn switch_network(&self, id: RequestId, origin: &str, network: &str) -> Result<String> {
        self.network_config(network)?;

        let logo = self.popups.active_tab_logo().await;
        let route = PopupRoute::SwitchNetwork {
            id,
            origin: origin.to_string(),
            logo: logo.clone(),
            network: network.to_string(),
        };
        let request = PendingRequest::new(
            id,
            origin,
            &logo,
            RequestPayload::SwitchNetwork(network.to_string()),
        );
        let _: Value = self.request_approval(request, route).await?;

        self.store.set_network(network).await?;
        log::info!("DApp: {} switched network to {}", origin, network);
        Ok(network.to_string())
    }

    pub async fn watch_jetton(&self, id: RequestId, origin: &str, jetton: JettonParams) -> Result<Value> {
        self.check_base_dapp_permission(origin).await?;

        let logo = self.popups.active_tab_logo().await;
        let route = PopupRoute::Jetton {
            id,
            origin: origin.to_string(),
            logo: logo.clone(),
            jetton: jetton.clone(),
        };
        let request = PendingRequest::new(id, origin, &logo, RequestPayload::WatchJetton(jetton));
        self.request_approval(request, route).await
    }

    pub async fn watch_nft(&self, id: RequestId, origin: &str, nft: NftParams) -> Result<Value> {
        self.check_base_dapp_permission(origin).await?;

        let logo = self.popups.active_tab_logo().await;
        let route = PopupRoute::Nft {
            id,
            origin: origin.to_string(),
            logo: logo.clone(),
            nft: nft.clone(),
        };
        let request = PendingRequest::new(id, origin, &logo, RequestPayload::WatchNft(nft));
        self.request_approval(request, route).await
    }

    /// Show the unlock screen of a locked wallet
    pub async fn open_unlock_popup(&self) -> Result<WindowId> {
        self.popups.open(&PopupRoute::Unlock).await
    }
}

impl Drop for DAppService {
    fn drop(&mut self) {
        if let Some(listener) = self.close_listener.lock().take() {
            listener.abort();
        }
    }
}
