use std::sync::Arc;

use serde::Serialize;

use crate::bridge::protocol::{parse_popup_response, BridgeRequest, BridgeResponse, DAppMethod};
use crate::bus::BackgroundEvent;
use crate::dapp::DAppService;
use crate::error::{BrokerError, Result};

/// Routes bridge traffic into the dApp service
pub struct BridgeHandler {
    service: Arc<DAppService>,
}

fn reply<T: Serialize>(id: u64, result: Result<T>) -> BridgeResponse {
    match result.and_then(|value| Ok(serde_json::to_value(value)?)) {
        Ok(value) => BridgeResponse::ok(id, value),
        Err(e) => {
            if e.is_user_decision() {
                log::warn!("Bridge: request {} ended by user: {}", id, e);
            } else {
                log::error!("Bridge: request {} failed: {}", id, e);
            }
            BridgeResponse::error(id, &e)
        }
    }
}

impl BridgeHandler {
    pub fn new(service: Arc<DAppService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<DAppService> {
        &self.service
    }

    /// Forward a popup answer to whichever flow waits for it.
    ///
    /// Only the privileged popup side may call this; dApp sockets never reach it.
    pub fn handle_response(&self, event: BackgroundEvent) -> usize {
        let delivered = self.service.bus().publish(event);
        if delivered == 0 {
            log::warn!("Bridge: popup response had no waiting request");
        }
        delivered
    }

    /// Parse and forward one text frame sent by the popup
    pub fn handle_popup_frame(&self, text: &str) -> Result<usize> {
        let event = parse_popup_response(text)?;
        Ok(self.handle_response(event))
    }

    /// Parse one dApp frame.
    ///
    /// `peer_origin` is the `Origin` header of the socket handshake. When
    /// present it is authoritative: a frame claiming another origin is refused,
    /// and a frame without one inherits it.
    pub fn route_frame(&self, text: &str, peer_origin: Option<&str>) -> Result<BridgeRequest> {
        let mut request = BridgeRequest::parse(text)?;
        if let Some(peer) = peer_origin {
            if request.origin.is_empty() {
                request.origin = peer.to_string();
            } else if request.origin != peer {
                log::warn!(
                    "Bridge: request {} claims origin {} on a socket opened by {}",
                    request.id,
                    request.origin,
                    peer
                );
                return Err(BrokerError::Unauthorized(format!(
                    "Origin {} does not match connection origin {}",
                    request.origin, peer
                )));
            }
        }
        Ok(request)
    }

    /// Handle incoming bridge requests
    pub async fn handle_request(&self, request: BridgeRequest) -> BridgeResponse {
        let BridgeRequest { id, origin, method } = request;
        log::info!("Bridge: {} request {} from {}", method_name(&method), id, origin);

        let service = &self.service;
        match method {
            DAppMethod::Connect(connect) => reply(id, service.connect(id, &origin, connect).await),
            DAppMethod::Reconnect => reply(id, service.reconnect(&origin).await),
            DAppMethod::Disconnect => reply(id, service.disconnect(&origin).await.map(|_| true)),
            DAppMethod::SendTransaction(params) => {
                reply(id, service.send_transaction(id, &origin, params).await)
            }
            DAppMethod::TonConnectSend(payload) => {
                reply(id, service.ton_connect_send(id, &origin, payload).await)
            }
            DAppMethod::SignRaw(params) => reply(id, service.sign_raw(id, &origin, params.data).await),
            DAppMethod::SignPersonal(params) => {
                reply(id, service.sign_personal(id, &origin, params.data).await)
            }
            DAppMethod::SwitchNetwork(network) => {
                reply(id, service.switch_network(id, &origin, &network).await)
            }
            DAppMethod::WatchJetton(jetton) => reply(id, service.watch_jetton(id, &origin, jetton).await),
            DAppMethod::WatchNft(nft) => reply(id, service.watch_nft(id, &origin, nft).await),
        }
    }
}

fn method_name(method: &DAppMethod) -> &'static str {
    match method {
        DAppMethod::Connect(_) => "connect",
        DAppMethod::Reconnect => "reconnect",
        DAppMethod::Disconnect => "disconnect",
        DAppMethod::SendTransaction(_) => "sendTransaction",
        DAppMethod::TonConnectSend(_) => "tonConnectSend",
        DAppMethod::SignRaw(_) => "signRaw",
        DAppMethod::SignPersonal(_) => "signPersonal",
        DAppMethod::SwitchNetwork(_) => "switchNetwork",
        DAppMethod::WatchJetton(_) => "watchJetton",
        DAppMethod::WatchNft(_) => "watchNft",
    }
}
