//! Correlates popup responses with the flow that asked for them.
//!
//! A waiting flow holds two subscriptions: responses for its own request id
//! and popup-closed notifications. Whichever terminal event arrives first
//! ends the wait, and both subscriptions are released with the [`Approval`].

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::bus::{BackgroundEvent, EventBus, RequestId, Subscription, Topic};
use crate::error::{BrokerError, Result};
use crate::platform::WindowId;

/// Decision carried by a popup response
#[derive(Debug, Clone, PartialEq)]
pub enum ApprovalOutcome<T> {
    Approved(T),
    Rejected(BrokerError),
}

impl ApprovalOutcome<Value> {
    /// An `error` key marks a rejection; any other shape is an approval
    pub fn from_params(params: Value) -> Self {
        match params.get("error") {
            Some(error) => ApprovalOutcome::Rejected(BrokerError::UserRejected(rejection_message(error))),
            None => ApprovalOutcome::Approved(params),
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            ApprovalOutcome::Approved(value) => serde_json::from_value(value)
                .map_err(|e| BrokerError::InvalidPayload(format!("Unexpected approval payload: {}", e))),
            ApprovalOutcome::Rejected(e) => Err(e),
        }
    }
}

fn rejection_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Object(fields) => fields
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        Value::Null => "Rejected".to_string(),
        other => other.to_string(),
    }
}

/// Registered interest in the outcome of one request
pub struct Approval {
    id: RequestId,
    responses: Subscription,
    closed: Subscription,
}

impl Approval {
    /// Subscribe before the popup is shown so no response can be missed
    pub fn register(bus: &EventBus, id: RequestId) -> Self {
        Self {
            id,
            responses: bus.subscribe(Topic::Response(id)),
            closed: bus.subscribe(Topic::ClosedPopUp),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Suspend until the request is answered or `popup` closes
    pub async fn wait<T: DeserializeOwned>(mut self, popup: Option<WindowId>) -> Result<T> {
        loop {
            tokio::select! {
                biased;

                event = self.responses.recv() => match event {
                    Some(BackgroundEvent::Response { id, params }) if id == self.id => {
                        let outcome = ApprovalOutcome::from_params(params);
                        if let ApprovalOutcome::Rejected(e) = &outcome {
                            log::warn!("Approval: request {} rejected: {}", self.id, e);
                        } else {
                            log::info!("Approval: request {} approved", self.id);
                        }
                        return outcome.decode();
                    }
                    Some(_) => continue,
                    None => return Err(BrokerError::Platform("Response channel closed".to_string())),
                },

                event = self.closed.recv() => match event {
                    Some(BackgroundEvent::ClosedPopUp { params }) if popup == Some(params) => {
                        log::warn!("Approval: popup {} closed before request {} resolved", params, self.id);
                        return Err(BrokerError::UserClosedPopup);
                    }
                    Some(_) => continue,
                    None => return Err(BrokerError::Platform("Close channel closed".to_string())),
                },
            }
        }
    }
}

/// Wait for the popup's answer to request `id`
pub async fn wait_approve<T: DeserializeOwned>(
    bus: &EventBus,
    id: RequestId,
    popup: Option<WindowId>,
) -> Result<T> {
    Approval::register(bus, id).wait(popup).await
}
