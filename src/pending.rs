//! Requests currently waiting for a popup decision.
//!
//! The popup renders the whole ordered list, so several requests can share
//! one popup window.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::bus::RequestId;
use crate::error::{BrokerError, Result};
use crate::dapp::types::{
    JettonParams, NftParams, TonConnectRequest, TonConnectTransactionPayload, TransactionParams,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestKind {
    Connect,
    /// Connect request carrying a `ton_proof` item
    ReconnectProof,
    SendTransaction,
    SignRaw,
    SignPersonal,
    SwitchNetwork,
    WatchJetton,
    WatchNft,
}

/// Kind-specific data shown by the popup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum RequestPayload {
    Connect(TonConnectRequest),
    ReconnectProof(TonConnectRequest),
    SendTransaction(TransactionParams),
    #[serde(rename = "tonConnectSend")]
    TonConnectSend(TonConnectTransactionPayload),
    SignRaw(String),
    SignPersonal(String),
    SwitchNetwork(String),
    WatchJetton(JettonParams),
    WatchNft(NftParams),
}

impl RequestPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestPayload::Connect(_) => RequestKind::Connect,
            RequestPayload::ReconnectProof(_) => RequestKind::ReconnectProof,
            RequestPayload::SendTransaction(_) | RequestPayload::TonConnectSend(_) => {
                RequestKind::SendTransaction
            }
            RequestPayload::SignRaw(_) => RequestKind::SignRaw,
            RequestPayload::SignPersonal(_) => RequestKind::SignPersonal,
            RequestPayload::SwitchNetwork(_) => RequestKind::SwitchNetwork,
            RequestPayload::WatchJetton(_) => RequestKind::WatchJetton,
            RequestPayload::WatchNft(_) => RequestKind::WatchNft,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub id: RequestId,
    pub origin: String,
    pub logo: String,
    #[serde(flatten)]
    pub payload: RequestPayload,
    pub created_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(id: RequestId, origin: &str, logo: &str, payload: RequestPayload) -> Self {
        Self {
            id,
            origin: origin.to_string(),
            logo: logo.to_string(),
            payload,
            created_at: Utc::now(),
        }
    }

    pub fn kind(&self) -> RequestKind {
        self.payload.kind()
    }
}

/// In-memory pending request list shared with the popup
#[derive(Clone, Default)]
pub struct PendingStore {
    requests: Arc<Mutex<Vec<PendingRequest>>>,
}

impl PendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `request`. Ids are caller-assigned, so a live id is refused
    /// rather than merged with the request already holding it.
    pub fn add(&self, request: PendingRequest) -> Result<()> {
        let mut requests = self.requests.lock();
        if requests.iter().any(|r| r.id == request.id) {
            log::warn!(
                "Pending: refused request {} from {}, the id is already pending",
                request.id,
                request.origin
            );
            return Err(BrokerError::InvalidPayload(format!(
                "Request {} is already pending",
                request.id
            )));
        }
        log::info!(
            "Pending: added {:?} request {} from {}",
            request.kind(),
            request.id,
            request.origin
        );
        requests.push(request);
        Ok(())
    }

    /// Remove `id`; removing an absent id is a no-op
    pub fn remove(&self, id: RequestId) -> Option<PendingRequest> {
        let mut requests = self.requests.lock();
        let index = requests.iter().position(|r| r.id == id)?;
        Some(requests.remove(index))
    }

    /// Requests in insertion order
    pub fn list(&self) -> Vec<PendingRequest> {
        self.requests.lock().clone()
    }

    pub fn get(&self, id: RequestId) -> Option<PendingRequest> {
        self.requests.lock().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hold a slot for `request` until the returned guard drops
    pub fn acquire(&self, request: PendingRequest) -> Result<PendingSlot> {
        let id = request.id;
        self.add(request)?;
        Ok(PendingSlot { store: self.clone(), id })
    }
}

/// Removes its request from the store on drop, whatever way the flow ended
pub struct PendingSlot {
    store: PendingStore,
    id: RequestId,
}

impl PendingSlot {
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Drop for PendingSlot {
    fn drop(&mut self) {
        if self.store.remove(self.id).is_some() {
            log::debug!("Pending: released request {}", self.id);
        }
    }
}
