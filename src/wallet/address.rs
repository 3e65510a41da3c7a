//! Deterministic wallet contract addresses.
//!
//! The address of a wallet is the hash of its initial state: the contract
//! code of its version plus the initial data holding the public key. The same
//! identity therefore always maps to the same address, and a retired version
//! fails instead of hashing the wrong template.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use crc::{Crc, CRC_16_XMODEM};

use super::cell::{Cell, CellBuilder, CellRef};
use super::contract::{code_ref, data_cell, WalletVersion};
use super::WalletState;
use crate::config::TESTNET;
use crate::error::{BrokerError, Result};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

const BOUNCEABLE_TAG: u8 = 0x11;
const NON_BOUNCEABLE_TAG: u8 = 0x51;
const TEST_FLAG: u8 = 0x80;

/// Inputs that fully determine a wallet address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletIdentity {
    pub public_key: [u8; 32],
    pub version: WalletVersion,
    pub workchain: i8,
}

impl WalletIdentity {
    pub fn new(public_key: [u8; 32], version: WalletVersion) -> Self {
        Self {
            public_key,
            version,
            workchain: 0,
        }
    }

    pub fn from_hex(public_key: &str, version: WalletVersion, workchain: i8) -> Result<Self> {
        let mut key = [0u8; 32];
        hex::decode_to_slice(public_key, &mut key)
            .map_err(|e| BrokerError::InvalidPayload(format!("Invalid public key: {}", e)))?;
        Ok(Self {
            public_key: key,
            version,
            workchain,
        })
    }
}

/// Code and data a contract is deployed with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInit {
    pub code: CellRef,
    pub data: Cell,
}

impl StateInit {
    /// `split_depth:(Maybe) special:(Maybe) code:(Maybe ^Cell) data:(Maybe ^Cell) library:(Maybe)`
    pub fn to_cell(&self) -> Result<Cell> {
        let mut builder = CellBuilder::new();
        builder
            .store_bit(false)?
            .store_bit(false)?
            .store_bit(true)?
            .store_bit(true)?
            .store_bit(false)?
            .store_ref(self.code)?
            .store_ref(self.data.to_ref())?;
        Ok(builder.build())
    }

    pub fn hash(&self) -> Result<[u8; 32]> {
        Ok(self.to_cell()?.hash())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl Address {
    /// `workchain:hex` form used by TON Connect
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// Base64url user-facing form with bounce and test-only flags
    pub fn to_friendly(&self, bounceable: bool, test_only: bool) -> String {
        let mut tag = if bounceable { BOUNCEABLE_TAG } else { NON_BOUNCEABLE_TAG };
        if test_only {
            tag |= TEST_FLAG;
        }

        let mut bytes = Vec::with_capacity(36);
        bytes.push(tag);
        bytes.push(self.workchain as u8);
        bytes.extend_from_slice(&self.hash);
        let crc = CRC16.checksum(&bytes);
        bytes.extend_from_slice(&crc.to_be_bytes());

        base64::engine::general_purpose::URL_SAFE.encode(bytes)
    }

    fn parse_raw(s: &str) -> Result<Self> {
        let (wc, hash_hex) = s
            .split_once(':')
            .ok_or_else(|| BrokerError::InvalidPayload(format!("Invalid address: {}", s)))?;
        let workchain = wc
            .parse::<i8>()
            .map_err(|e| BrokerError::InvalidPayload(format!("Invalid workchain: {}", e)))?;
        let mut hash = [0u8; 32];
        hex::decode_to_slice(hash_hex, &mut hash)
            .map_err(|e| BrokerError::InvalidPayload(format!("Invalid address hash: {}", e)))?;
        Ok(Self { workchain, hash })
    }

    fn parse_friendly(s: &str) -> Result<Self> {
        let normalized = s.replace('+', "-").replace('/', "_");
        let bytes = base64::engine::general_purpose::URL_SAFE
            .decode(normalized)
            .map_err(|e| BrokerError::InvalidPayload(format!("Invalid address encoding: {}", e)))?;
        if bytes.len() != 36 {
            return Err(BrokerError::InvalidPayload(format!("Invalid address length: {}", bytes.len())));
        }
        let expected = CRC16.checksum(&bytes[..34]);
        if expected.to_be_bytes() != bytes[34..] {
            return Err(BrokerError::InvalidPayload("Address checksum mismatch".to_string()));
        }
        let tag = bytes[0] & !TEST_FLAG;
        if tag != BOUNCEABLE_TAG && tag != NON_BOUNCEABLE_TAG {
            return Err(BrokerError::InvalidPayload(format!("Unknown address tag: {:#x}", bytes[0])));
        }
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes[2..34]);
        Ok(Self {
            workchain: bytes[1] as i8,
            hash,
        })
    }
}

impl FromStr for Address {
    type Err = BrokerError;

    /// Accepts both raw and user-friendly forms
    fn from_str(s: &str) -> Result<Self> {
        if s.contains(':') {
            Self::parse_raw(s)
        } else {
            Self::parse_friendly(s)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

pub fn wallet_state_init(identity: &WalletIdentity) -> Result<StateInit> {
    let code = code_ref(identity.version)?;
    let data = data_cell(identity.version, &identity.public_key, identity.workchain)?;
    Ok(StateInit { code, data })
}

pub fn derive_address(identity: &WalletIdentity) -> Result<Address> {
    let init = wallet_state_init(identity)?;
    Ok(Address {
        workchain: identity.workchain,
        hash: init.hash()?,
    })
}

/// User-facing address of a stored wallet on `network`
pub fn wallet_address(wallet: &WalletState, network: &str) -> Result<String> {
    let identity = wallet.identity()?;
    let address = derive_address(&identity)?;
    Ok(address.to_friendly(wallet.is_bounceable, network == TESTNET))
}

/// Whether two address strings, in any form, name the same account
pub fn same_address(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (a.parse::<Address>(), b.parse::<Address>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
