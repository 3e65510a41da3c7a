use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::{BackgroundEvent, RequestId};
use crate::dapp::types::{
    JettonParams, NftParams, TonConnectRequest, TonConnectTransactionPayload, TransactionParams,
};
use crate::error::{BrokerError, ErrorCode, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignParams {
    /// Hex for raw signing, text for personal signing
    pub data: String,
}

/// dApp calls accepted over the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "camelCase")]
pub enum DAppMethod {
    Connect(TonConnectRequest),
    Reconnect,
    Disconnect,
    SendTransaction(TransactionParams),
    TonConnectSend(TonConnectTransactionPayload),
    SignRaw(SignParams),
    SignPersonal(SignParams),
    /// Name of the requested network
    SwitchNetwork(String),
    WatchJetton(JettonParams),
    WatchNft(NftParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BridgeRequest {
    pub id: RequestId,
    pub origin: String,
    pub method: DAppMethod,
}

/// One text frame as it arrives on the socket
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(default)]
    id: RequestId,
    #[serde(default)]
    origin: String,
    method: String,
    #[serde(default)]
    params: Value,
}

const RESPONSE_METHOD: &str = "response";

impl BridgeRequest {
    /// Parse a dApp frame. Popup answers are refused on this channel.
    pub fn parse(text: &str) -> Result<Self> {
        let frame: InboundFrame = serde_json::from_str(text)?;

        if frame.method == RESPONSE_METHOD {
            return Err(BrokerError::InvalidPayload(
                "Popup responses are not accepted from dApps".to_string(),
            ));
        }

        let mut tagged = serde_json::Map::new();
        tagged.insert("method".to_string(), Value::String(frame.method));
        if !frame.params.is_null() {
            tagged.insert("params".to_string(), frame.params);
        }
        let method: DAppMethod = serde_json::from_value(Value::Object(tagged))?;

        Ok(BridgeRequest {
            id: frame.id,
            origin: frame.origin,
            method,
        })
    }
}

/// Parse a frame from the popup, `{"method":"response","id":N,"params":..}`
pub fn parse_popup_response(text: &str) -> Result<BackgroundEvent> {
    let frame: InboundFrame = serde_json::from_str(text)?;
    if frame.method != RESPONSE_METHOD {
        return Err(BrokerError::InvalidPayload(format!(
            "Expected a popup response, got {}",
            frame.method
        )));
    }
    Ok(BackgroundEvent::Response {
        id: frame.id,
        params: frame.params,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// Reply sent back to the dApp for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeResponse {
    pub id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeErrorBody>,
}

impl BridgeResponse {
    pub fn ok(id: RequestId, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: RequestId, error: &BrokerError) -> Self {
        Self {
            id,
            result: None,
            error: Some(BridgeErrorBody {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }
}
