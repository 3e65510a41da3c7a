//! Approval broker of a TON browser wallet extension.
//!
//! Untrusted dApp requests come in over the [`bridge`], are queued in the
//! [`pending`] list, surfaced in a single [`popup`] window and resolved when
//! the popup answers on the [`bus`] or is closed by the user.

pub mod approval;
pub mod bridge;
pub mod bus;
pub mod config;
pub mod dapp;
pub mod error;
pub mod pending;
pub mod platform;
pub mod popup;
pub mod storage;
pub mod units;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use approval::{wait_approve, Approval, ApprovalOutcome};
pub use bus::{BackgroundEvent, EventBus, RequestId, Subscription, Topic};
pub use config::{BrokerConfig, NetworkConfig, PopupConfig};
pub use dapp::DAppService;
pub use error::{BrokerError, ErrorCode, Result};
pub use pending::{PendingRequest, PendingStore, RequestKind, RequestPayload};
pub use platform::{ExtensionPlatform, WindowId};
pub use popup::{PopupManager, PopupRoute};
pub use storage::{BrowserStore, Connections, DAppAccess, FileStore, MemoryStore};
pub use wallet::{derive_address, Address, StateInitEncoder, WalletIdentity, WalletVersion};
