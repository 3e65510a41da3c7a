use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrokerError>;

/// Numeric codes reported back to the dApp alongside an error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum ErrorCode {
    UserRejected,
    Unauthorized,
    Unsupported,
    InvalidParams,
    Internal,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> i32 {
        match code {
            ErrorCode::UserRejected => 4001,
            ErrorCode::Unauthorized => 4100,
            ErrorCode::Unsupported => 4200,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::Internal => -32603,
        }
    }
}

impl TryFrom<i32> for ErrorCode {
    type Error = String;

    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        match value {
            4001 => Ok(ErrorCode::UserRejected),
            4100 => Ok(ErrorCode::Unauthorized),
            4200 => Ok(ErrorCode::Unsupported),
            -32602 => Ok(ErrorCode::InvalidParams),
            -32603 => Ok(ErrorCode::Internal),
            other => Err(format!("Unknown error code: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    /// No connection or wallet state matches the origin
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The popup answered with an explicit rejection
    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("User closed the popup")]
    UserClosedPopup,

    #[error("Unsupported wallet contract version - {0}")]
    UnsupportedContractVersion(String),

    /// An extension window or tab call failed
    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
}

impl BrokerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BrokerError::Unauthorized(_) => ErrorCode::Unauthorized,
            BrokerError::UserRejected(_) | BrokerError::UserClosedPopup => ErrorCode::UserRejected,
            BrokerError::UnsupportedContractVersion(_) => ErrorCode::Unsupported,
            BrokerError::InvalidPayload(_) | BrokerError::UnknownNetwork(_) => ErrorCode::InvalidParams,
            BrokerError::Platform(_) | BrokerError::Storage(_) => ErrorCode::Internal,
        }
    }

    /// Whether the error ends a flow because of something the user did in the popup
    pub fn is_user_decision(&self) -> bool {
        matches!(self, BrokerError::UserRejected(_) | BrokerError::UserClosedPopup)
    }
}

impl From<serde_json::Error> for BrokerError {
    fn from(e: serde_json::Error) -> Self {
        BrokerError::InvalidPayload(e.to_string())
    }
}

impl From<std::io::Error> for BrokerError {
    fn from(e: std::io::Error) -> Self {
        BrokerError::Storage(e.to_string())
    }
}
