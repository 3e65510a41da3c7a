use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellBuilder, CellRef};
use crate::error::{BrokerError, Result};

/// Base subwallet id of v3+ wallets; the workchain is added to it
pub const DEFAULT_WALLET_ID: u32 = 698983191;

/// Wallet contract revisions a stored wallet can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletVersion {
    #[serde(rename = "v2R1")]
    V2R1,
    #[serde(rename = "v2R2")]
    V2R2,
    #[serde(rename = "v3R1")]
    V3R1,
    #[serde(rename = "v3R2")]
    V3R2,
    /// Retired revision, never derived
    #[serde(rename = "v4R1")]
    V4R1,
    #[serde(rename = "v4R2")]
    V4R2,
}

impl WalletVersion {
    pub const ALL: [WalletVersion; 6] = [
        WalletVersion::V2R1,
        WalletVersion::V2R2,
        WalletVersion::V3R1,
        WalletVersion::V3R2,
        WalletVersion::V4R1,
        WalletVersion::V4R2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletVersion::V2R1 => "v2R1",
            WalletVersion::V2R2 => "v2R2",
            WalletVersion::V3R1 => "v3R1",
            WalletVersion::V3R2 => "v3R2",
            WalletVersion::V4R1 => "v4R1",
            WalletVersion::V4R2 => "v4R2",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, WalletVersion::V4R1)
    }
}

impl fmt::Display for WalletVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletVersion {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        WalletVersion::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| BrokerError::UnsupportedContractVersion(s.to_string()))
    }
}

enum DataLayout {
    /// seqno, public key
    Simple,
    /// seqno, subwallet id, public key
    Subwallet,
    /// seqno, subwallet id, public key, empty plugin dictionary
    Plugins,
}

/// Code cell and data layout of one contract revision
struct ContractTemplate {
    code_hash: &'static str,
    code_depth: u16,
    layout: DataLayout,
}

fn template(version: WalletVersion) -> Result<ContractTemplate> {
    let template = match version {
        WalletVersion::V2R1 => ContractTemplate {
            code_hash: "5c9a5e68c108e18721a07c42f9956bfb39ad77ec6d624b60c576ec88eee65329",
            code_depth: 0,
            layout: DataLayout::Simple,
        },
        WalletVersion::V2R2 => ContractTemplate {
            code_hash: "fe9530d3243853083ef2ef0b4c2908c0abf6fa1c31ea243aacaa5bf8c7d753f1",
            code_depth: 0,
            layout: DataLayout::Simple,
        },
        WalletVersion::V3R1 => ContractTemplate {
            code_hash: "b61041a58a7980b946e8fb9e198e3c904d24799ffa36574ea4251c41a566f581",
            code_depth: 0,
            layout: DataLayout::Subwallet,
        },
        WalletVersion::V3R2 => ContractTemplate {
            code_hash: "84dafa449f98a6987789ba232358072bc0f76dc4524002a5d0918b9a75d2d599",
            code_depth: 0,
            layout: DataLayout::Subwallet,
        },
        WalletVersion::V4R1 => {
            return Err(BrokerError::UnsupportedContractVersion(version.to_string()));
        }
        WalletVersion::V4R2 => ContractTemplate {
            code_hash: "feb5ff6820e2ff0d9483e7e0d62c817d846789fb4ae580c878866d959dabd5c0",
            code_depth: 7,
            layout: DataLayout::Plugins,
        },
    };
    Ok(template)
}

/// Code reference of `version`'s contract
pub fn code_ref(version: WalletVersion) -> Result<CellRef> {
    let template = template(version)?;
    let mut hash = [0u8; 32];
    hex::decode_to_slice(template.code_hash, &mut hash)
        .map_err(|e| BrokerError::InvalidPayload(format!("Bad code hash for {}: {}", version, e)))?;
    Ok(CellRef {
        hash,
        depth: template.code_depth,
    })
}

/// Initial persistent data of a fresh wallet
pub fn data_cell(version: WalletVersion, public_key: &[u8; 32], workchain: i8) -> Result<Cell> {
    let template = template(version)?;
    let wallet_id = DEFAULT_WALLET_ID.wrapping_add_signed(i32::from(workchain));

    let mut builder = CellBuilder::new();
    builder.store_uint(0, 32)?;
    match template.layout {
        DataLayout::Simple => {
            builder.store_bytes(public_key)?;
        }
        DataLayout::Subwallet => {
            builder.store_uint(u64::from(wallet_id), 32)?.store_bytes(public_key)?;
        }
        DataLayout::Plugins => {
            builder
                .store_uint(u64::from(wallet_id), 32)?
                .store_bytes(public_key)?
                .store_bit(false)?;
        }
    }
    Ok(builder.build())
}
