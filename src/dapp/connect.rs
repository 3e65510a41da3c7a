//! TON Connect handshake: silent reconnect or full approval.

use super::types::{TonAddressItemReply, TonConnectItemReply, TonConnectRequest};
use super::DAppService;
use crate::bus::RequestId;
use crate::error::{BrokerError, Result};
use crate::pending::{PendingRequest, RequestPayload};
use crate::popup::PopupRoute;
use crate::wallet::{derive_address, same_address, wallet_state_init};

impl DAppService {
    /// Answer from a previous authorization of `origin`, without any UI.
    ///
    /// Fails with `Unauthorized` when there is nothing to reuse, which callers
    /// treat as "ask the user".
    pub async fn reconnect(&self, origin: &str) -> Result<Vec<TonConnectItemReply>> {
        let network = self.store.network().await?;
        let connections = self.store.connections(&network).await?;
        let wallet_address = connections
            .wallets_by_origin(origin)
            .into_iter()
            .next()
            .ok_or_else(|| BrokerError::Unauthorized("Missing connected wallet".to_string()))?;

        let account = self.store.account_state(&network).await?;
        let wallet = account
            .wallet(&wallet_address)
            .ok_or_else(|| BrokerError::Unauthorized("Missing wallet state".to_string()))?;

        let config = self.network_config(&network)?;
        let identity = wallet.identity()?;
        let init = wallet_state_init(&identity)?;
        let address = derive_address(&identity)?;

        Ok(vec![TonConnectItemReply::TonAddress(TonAddressItemReply {
            address: address.to_raw(),
            network: config.id.clone(),
            wallet_state_init: self.encoder.encode_state_init(&init)?,
            public_key: Some(wallet.public_key.clone()),
        })])
    }

    pub async fn connect(
        &self,
        id: RequestId,
        origin: &str,
        request: TonConnectRequest,
    ) -> Result<Vec<TonConnectItemReply>> {
        if request.requires_proof() {
            return self.connect_with_approval(id, origin, request).await;
        }

        match self.reconnect(origin).await {
            Ok(reply) => {
                log::info!("DApp: {} reconnected silently", origin);
                Ok(reply)
            }
            Err(e) => {
                log::warn!("DApp: silent reconnect for {} refused: {}", origin, e);
                self.connect_with_approval(id, origin, request).await
            }
        }
    }

    async fn connect_with_approval(
        &self,
        id: RequestId,
        origin: &str,
        request: TonConnectRequest,
    ) -> Result<Vec<TonConnectItemReply>> {
        let logo = self.popups.active_tab_logo().await;
        let route = PopupRoute::ConnectDApp {
            id,
            origin: origin.to_string(),
            logo: logo.clone(),
        };
        let payload = if request.requires_proof() {
            RequestPayload::ReconnectProof(request)
        } else {
            RequestPayload::Connect(request)
        };

        let reply: Vec<TonConnectItemReply> = self
            .request_approval(PendingRequest::new(id, origin, &logo, payload), route)
            .await?;
        self.remember_connection(origin, &reply).await?;
        Ok(reply)
    }

    /// Grant `origin` every address the user approved
    async fn remember_connection(&self, origin: &str, reply: &[TonConnectItemReply]) -> Result<()> {
        let _writes = self.store_writes.lock().await;
        let network = self.store.network().await?;
        let account = self.store.account_state(&network).await?;
        let mut connections = self.store.connections(&network).await?;

        for item in reply {
            if let TonConnectItemReply::TonAddress(item) = item {
                // Store the wallet's own form so lookups match the account list
                let address = account
                    .wallets
                    .iter()
                    .find(|w| same_address(&w.address, &item.address))
                    .map(|w| w.address.clone())
                    .unwrap_or_else(|| item.address.clone());
                connections = connections.grant_dapp_access(origin, &address);
                log::info!("DApp: granted {} access to {}", origin, address);
            }
        }

        self.store.set_connections(&network, &connections).await
    }

    /// Revoke everything `origin` was granted on the active network
    pub async fn disconnect(&self, origin: &str) -> Result<()> {
        let _writes = self.store_writes.lock().await;
        let network = self.store.network().await?;
        let connections = self.store.connections(&network).await?;
        self.store
            .set_connections(&network, &connections.revoke_all_dapp_access(origin))
            .await?;
        log::info!("DApp: {} disconnected on {}", origin, network);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{harness, wallet_state, ORIGIN, PUBLIC_KEY};
    use super::*;
    use crate::bus::BackgroundEvent;
    use crate::config::MAINNET;
    use crate::dapp::types::ConnectItem;
    use crate::pending::RequestKind;
    use crate::bridge::{BridgeRequest, DAppMethod};
    use crate::config::BrokerConfig;
    use crate::storage::{BrowserStore, Connections, FileStore};
    use crate::testing::{wait_for_popup, FakePlatform, HashEncoder};
    use std::sync::Arc;
    use crate::wallet::{AccountState, StateInitEncoder, WalletIdentity, WalletVersion};

    fn address_request() -> TonConnectRequest {
        TonConnectRequest {
            manifest_url: "https://example.com/tonconnect-manifest.json".to_string(),
            items: vec![ConnectItem::TonAddress],
        }
    }

    fn proof_request() -> TonConnectRequest {
        TonConnectRequest {
            manifest_url: String::new(),
            items: vec![ConnectItem::TonProof {
                payload: "nonce".to_string(),
            }],
        }
    }

    fn expected_reply() -> TonAddressItemReply {
        let identity = WalletIdentity::from_hex(PUBLIC_KEY, WalletVersion::V3R2, 0).unwrap();
        let init = wallet_state_init(&identity).unwrap();
        TonAddressItemReply {
            address: derive_address(&identity).unwrap().to_raw(),
            network: "-239".to_string(),
            wallet_state_init: HashEncoder.encode_state_init(&init).unwrap(),
            public_key: Some(PUBLIC_KEY.to_string()),
        }
    }

    #[tokio::test]
    async fn test_connected_origin_reconnects_without_popup() {
        let h = harness().await;

        let reply = h.service.connect(1, ORIGIN, address_request()).await.unwrap();

        assert_eq!(reply, vec![TonConnectItemReply::TonAddress(expected_reply())]);
        assert!(reply_address_is_raw(&reply));
        assert!(h.platform.opened().is_empty());
        assert!(h.service.pending().is_empty());
    }

    fn reply_address_is_raw(reply: &[TonConnectItemReply]) -> bool {
        matches!(&reply[0], TonConnectItemReply::TonAddress(item) if item.address.starts_with("0:"))
    }

    #[tokio::test]
    async fn test_proof_request_always_asks_user() {
        let h = harness().await;
        let task = tokio::spawn({
            let service = h.service.clone();
            async move { service.connect(1, ORIGIN, proof_request()).await }
        });

        wait_for_popup(h.service.popups()).await;
        let opened = h.platform.opened();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].url.starts_with("index.html#/notifications/dapp?id=1&origin="));
        assert_eq!(h.service.pending().get(1).unwrap().kind(), RequestKind::ReconnectProof);
        assert!(!task.is_finished());

        let approved = vec![TonConnectItemReply::TonAddress(expected_reply())];
        h.service
            .bus()
            .publish(BackgroundEvent::approve(1, &approved).unwrap());

        assert_eq!(task.await.unwrap(), Ok(approved));
        assert!(h.service.pending().is_empty());
        assert_eq!(h.service.bus().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_bare_proof_frame_opens_connect_popup() {
        let h = harness().await;
        let request = BridgeRequest::parse(
            r#"{"id":1,"origin":"https://example.com","method":"connect","params":{"items":[{"name":"ton_proof"}]}}"#,
        )
        .unwrap();
        let DAppMethod::Connect(connect) = request.method else {
            panic!("frame did not parse as a connect");
        };

        let task = tokio::spawn({
            let service = h.service.clone();
            async move { service.connect(request.id, &request.origin, connect).await }
        });

        wait_for_popup(h.service.popups()).await;
        assert!(h.platform.opened()[0]
            .url
            .starts_with("index.html#/notifications/dapp?id=1&origin="));
        assert_eq!(h.service.pending().get(1).unwrap().kind(), RequestKind::ReconnectProof);
        assert!(!task.is_finished());

        h.service.bus().publish(BackgroundEvent::reject(1, "Reject"));
        assert!(matches!(task.await.unwrap(), Err(BrokerError::UserRejected(_))));
    }

    #[tokio::test]
    async fn test_concurrent_grants_are_all_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));
        let service = DAppService::new(
            &BrokerConfig::default(),
            FakePlatform::new(),
            store.clone(),
            Arc::new(HashEncoder),
        );

        let origins: Vec<String> = (0..8).map(|i| format!("https://dapp{}.example", i)).collect();
        let reply = vec![TonConnectItemReply::TonAddress(expected_reply())];
        let grants = origins
            .iter()
            .map(|origin| service.remember_connection(origin, &reply));
        for result in futures_util::future::join_all(grants).await {
            result.unwrap();
        }

        let connections = store.connections(MAINNET).await.unwrap();
        for origin in &origins {
            assert_eq!(connections.wallets_by_origin(origin), vec![expected_reply().address]);
        }
    }

    #[tokio::test]
    async fn test_unknown_origin_falls_back_and_is_remembered() {
        let h = harness().await;
        let origin = "https://new.example";
        let task = tokio::spawn({
            let service = h.service.clone();
            async move { service.connect(2, origin, address_request()).await }
        });

        wait_for_popup(h.service.popups()).await;
        assert_eq!(h.service.pending().get(2).unwrap().kind(), RequestKind::Connect);

        let approved = vec![TonConnectItemReply::TonAddress(expected_reply())];
        h.service
            .bus()
            .publish(BackgroundEvent::approve(2, &approved).unwrap());
        assert_eq!(task.await.unwrap(), Ok(approved));

        let connections = h.store.connections(MAINNET).await.unwrap();
        assert_eq!(connections.wallets_by_origin(origin), vec![h.wallet.address.clone()]);

        // The next plain connect is silent
        let reply = h.service.connect(3, origin, address_request()).await.unwrap();
        assert_eq!(reply, vec![TonConnectItemReply::TonAddress(expected_reply())]);
        assert_eq!(h.platform.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_connect_grants_nothing() {
        let h = harness().await;
        let origin = "https://new.example";
        let task = tokio::spawn({
            let service = h.service.clone();
            async move { service.connect(4, origin, address_request()).await }
        });

        wait_for_popup(h.service.popups()).await;
        h.service.bus().publish(BackgroundEvent::reject(4, "Reject"));

        assert_eq!(
            task.await.unwrap(),
            Err(BrokerError::UserRejected("Reject".to_string()))
        );
        let connections = h.store.connections(MAINNET).await.unwrap();
        assert!(connections.wallets_by_origin(origin).is_empty());
        assert!(h.service.pending().is_empty());
    }

    #[tokio::test]
    async fn test_reconnect_errors() {
        let h = harness().await;
        assert_eq!(
            h.service.reconnect("https://new.example").await,
            Err(BrokerError::Unauthorized("Missing connected wallet".to_string()))
        );

        h.store
            .set_account_state(MAINNET, &AccountState::default())
            .await
            .unwrap();
        assert_eq!(
            h.service.reconnect(ORIGIN).await,
            Err(BrokerError::Unauthorized("Missing wallet state".to_string()))
        );
    }

    #[tokio::test]
    async fn test_retired_wallet_is_not_reconnected() {
        let h = harness().await;
        let retired = wallet_state("Old", PUBLIC_KEY, WalletVersion::V4R1);
        let account = AccountState {
            wallets: vec![retired.clone()],
            active_wallet: Some(retired.address.clone()),
        };
        h.store.set_account_state(MAINNET, &account).await.unwrap();
        h.store
            .set_connections(
                MAINNET,
                &Connections::default().grant_dapp_access(ORIGIN, &retired.address),
            )
            .await
            .unwrap();

        assert_eq!(
            h.service.reconnect(ORIGIN).await,
            Err(BrokerError::UnsupportedContractVersion("v4R1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let h = harness().await;
        h.service.disconnect(ORIGIN).await.unwrap();
        h.service.disconnect(ORIGIN).await.unwrap();

        let connections = h.store.connections(MAINNET).await.unwrap();
        assert!(connections.wallets_by_origin(ORIGIN).is_empty());
        assert!(matches!(
            h.service.reconnect(ORIGIN).await,
            Err(BrokerError::Unauthorized(_))
        ));
    }
}
