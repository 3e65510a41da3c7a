use url::form_urlencoded;

use crate::bus::RequestId;
use crate::dapp::types::{JettonParams, NftParams, TransactionParams};
use crate::error::Result;
use crate::units::from_nano;

/// Screens the popup can be opened on, with their query parameters
#[derive(Debug, Clone, PartialEq)]
pub enum PopupRoute {
    /// List of every pending request
    Notifications,
    Unlock,
    ConnectDApp { id: RequestId, origin: String, logo: String },
    SwitchNetwork { id: RequestId, origin: String, logo: String, network: String },
    Jetton { id: RequestId, origin: String, logo: String, jetton: JettonParams },
    Nft { id: RequestId, origin: String, logo: String, nft: NftParams },
    Send {
        id: RequestId,
        origin: String,
        logo: String,
        address: String,
        /// Human-readable TON amount
        amount: String,
        comment: Option<String>,
    },
    SignRaw { id: RequestId, origin: String, logo: String },
    SignPersonal { id: RequestId, origin: String, logo: String },
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl PopupRoute {
    pub fn send(id: RequestId, origin: &str, logo: &str, params: &TransactionParams) -> Result<Self> {
        Ok(PopupRoute::Send {
            id,
            origin: origin.to_string(),
            logo: logo.to_string(),
            address: params.to.clone(),
            amount: from_nano(&params.value)?,
            comment: params.data.clone(),
        })
    }

    /// Route path, i.e. everything after `#` in the popup URL
    pub fn to_path(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());

        // `logo` arrives already encoded from the active tab lookup
        let path = match self {
            PopupRoute::Notifications => return "/notifications".to_string(),
            PopupRoute::Unlock => return "/notifications/unlock".to_string(),
            PopupRoute::ConnectDApp { id, origin, logo } => {
                query
                    .append_pair("id", &id.to_string())
                    .append_pair("origin", &encode(origin))
                    .append_pair("logo", logo);
                "/notifications/dapp"
            }
            PopupRoute::SwitchNetwork { id, origin, logo, network } => {
                query
                    .append_pair("id", &id.to_string())
                    .append_pair("origin", &encode(origin))
                    .append_pair("logo", logo)
                    .append_pair("network", network);
                "/notifications/network"
            }
            PopupRoute::Jetton { id, origin, logo, jetton } => {
                query
                    .append_pair("id", &id.to_string())
                    .append_pair("origin", &encode(origin))
                    .append_pair("logo", logo)
                    .append_pair("address", &encode(&jetton.address))
                    .append_pair("symbol", &encode(jetton.symbol.as_deref().unwrap_or_default()))
                    .append_pair("image", &encode(jetton.image.as_deref().unwrap_or_default()))
                    .append_pair("name", &encode(jetton.name.as_deref().unwrap_or_default()));
                "/notifications/jetton"
            }
            PopupRoute::Nft { id, origin, logo, nft } => {
                query
                    .append_pair("id", &id.to_string())
                    .append_pair("origin", &encode(origin))
                    .append_pair("logo", logo)
                    .append_pair("address", &encode(&nft.address));
                "/notifications/nft"
            }
            PopupRoute::Send { id, origin, logo, address, amount, comment } => {
                query
                    .append_pair("address", &encode(address))
                    .append_pair("amount", &encode(amount))
                    .append_pair("comment", &comment.as_deref().map(encode).unwrap_or_default())
                    .append_pair("submit", "1")
                    .append_pair("id", &id.to_string())
                    .append_pair("origin", &encode(origin))
                    .append_pair("logo", logo);
                "/send"
            }
            PopupRoute::SignRaw { id, origin, logo } => {
                query
                    .append_pair("id", &id.to_string())
                    .append_pair("origin", &encode(origin))
                    .append_pair("logo", logo);
                "/notifications/raw"
            }
            PopupRoute::SignPersonal { id, origin, logo } => {
                query
                    .append_pair("id", &id.to_string())
                    .append_pair("origin", &encode(origin))
                    .append_pair("logo", logo);
                "/notifications/personal"
            }
        };

        format!("{}?{}", path, query.finish())
    }
}
