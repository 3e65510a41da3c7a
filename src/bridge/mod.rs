pub mod handler;
pub mod protocol;
pub mod server;

pub use handler::BridgeHandler;
pub use protocol::{parse_popup_response, BridgeRequest, BridgeResponse, DAppMethod};
pub use server::BridgeServer;
