//! Background event channel between the broker and the popup UI.
//!
//! Subscriptions are scoped: dropping a [`Subscription`] removes its listener,
//! so a flow that leaves through any branch cannot leave a listener behind.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::BrokerError;
use crate::platform::WindowId;

/// Caller-assigned correlation id of a dApp request
pub type RequestId = u64;

/// Messages travelling over the background channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum BackgroundEvent {
    /// Popup answer for request `id`
    Response {
        id: RequestId,
        params: serde_json::Value,
    },
    /// The manager observed the popup window being removed
    #[serde(rename = "closedPopUp")]
    ClosedPopUp { params: WindowId },
}

impl BackgroundEvent {
    pub fn approve<T: Serialize>(id: RequestId, payload: &T) -> Result<Self, BrokerError> {
        Ok(BackgroundEvent::Response {
            id,
            params: serde_json::to_value(payload)?,
        })
    }

    pub fn reject(id: RequestId, message: &str) -> Self {
        BackgroundEvent::Response {
            id,
            params: serde_json::json!({ "error": { "message": message } }),
        }
    }

    fn topic(&self) -> Topic {
        match self {
            BackgroundEvent::Response { id, .. } => Topic::Response(*id),
            BackgroundEvent::ClosedPopUp { .. } => Topic::ClosedPopUp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Response(RequestId),
    ClosedPopUp,
}

struct Listener {
    topic: Topic,
    tx: mpsc::UnboundedSender<BackgroundEvent>,
}

#[derive(Default)]
struct BusInner {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Process-wide publish/subscribe channel
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.insert(id, Listener { topic, tx });

        Subscription {
            id,
            topic,
            rx,
            bus: Arc::clone(&self.inner),
        }
    }

    /// Deliver `event` to every live subscriber of its topic, returning how many received it
    pub fn publish(&self, event: BackgroundEvent) -> usize {
        let topic = event.topic();
        let inner = self.inner.lock();
        let mut delivered = 0;
        for listener in inner.listeners.values().filter(|l| l.topic == topic) {
            if listener.tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        log::debug!("Bus: {:?} delivered to {} listener(s)", topic, delivered);
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

/// Live listener on one topic; unsubscribes when dropped
pub struct Subscription {
    id: u64,
    topic: Topic,
    rx: mpsc::UnboundedReceiver<BackgroundEvent>,
    bus: Arc<Mutex<BusInner>>,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Next event in emission order
    pub async fn recv(&mut self) -> Option<BackgroundEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.lock().listeners.remove(&self.id);
    }
}
