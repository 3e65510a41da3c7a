// Minimal ordinary-cell builder, enough to hash wallet state inits
use sha2::{Digest, Sha256};

use crate::error::{BrokerError, Result};

pub const MAX_BITS: usize = 1023;
pub const MAX_REFS: usize = 4;

/// A child cell as seen by its parent: representation hash and depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub hash: [u8; 32],
    pub depth: u16,
}

/// Ordinary level-0 cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<CellRef>,
}

impl Cell {
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn refs(&self) -> &[CellRef] {
        &self.refs
    }

    pub fn depth(&self) -> u16 {
        self.refs.iter().map(|r| r.depth + 1).max().unwrap_or(0)
    }

    /// Data bytes with the completion tag applied to a partial last byte
    fn padded_data(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        let used = self.bit_len % 8;
        if used != 0 {
            if let Some(last) = data.last_mut() {
                *last |= 0x80 >> used;
            }
        }
        data
    }

    /// Representation hash
    pub fn hash(&self) -> [u8; 32] {
        let d1 = self.refs.len() as u8;
        let d2 = ((self.bit_len / 8) + self.bit_len.div_ceil(8)) as u8;

        let mut hasher = Sha256::new();
        hasher.update([d1, d2]);
        hasher.update(self.padded_data());
        for r in &self.refs {
            hasher.update(r.depth.to_be_bytes());
        }
        for r in &self.refs {
            hasher.update(r.hash);
        }
        hasher.finalize().into()
    }

    pub fn to_ref(&self) -> CellRef {
        CellRef {
            hash: self.hash(),
            depth: self.depth(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<CellRef>,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self> {
        if self.bit_len >= MAX_BITS {
            return Err(BrokerError::InvalidPayload("Cell overflow".to_string()));
        }
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            let last = self.data.len() - 1;
            self.data[last] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
        Ok(self)
    }

    /// Store the low `bits` bits of `value`, most significant first
    pub fn store_uint(&mut self, value: u64, bits: usize) -> Result<&mut Self> {
        if bits > 64 || (bits < 64 && value >> bits != 0) {
            return Err(BrokerError::InvalidPayload(format!(
                "Value {} does not fit in {} bits",
                value, bits
            )));
        }
        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1)?;
        }
        Ok(self)
    }

    pub fn store_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self> {
        for byte in bytes {
            self.store_uint(u64::from(*byte), 8)?;
        }
        Ok(self)
    }

    pub fn store_ref(&mut self, child: CellRef) -> Result<&mut Self> {
        if self.refs.len() >= MAX_REFS {
            return Err(BrokerError::InvalidPayload("Too many cell references".to_string()));
        }
        self.refs.push(child);
        Ok(self)
    }

    pub fn build(&self) -> Cell {
        Cell {
            data: self.data.clone(),
            bit_len: self.bit_len,
            refs: self.refs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cell_hash() {
        // Well-known hash of the empty ordinary cell
        let cell = CellBuilder::new().build();
        assert_eq!(
            hex::encode(cell.hash()),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
        assert_eq!(cell.depth(), 0);
    }

    #[test]
    fn test_bits_pack_msb_first() {
        let mut builder = CellBuilder::new();
        builder.store_bit(true).unwrap().store_uint(0b01, 2).unwrap();
        let cell = builder.build();
        assert_eq!(cell.bit_len(), 3);
        // 101 + completion tag 1 -> 1011_0000
        assert_eq!(cell.padded_data(), vec![0xb0]);
    }

    #[test]
    fn test_depth_follows_refs() {
        let leaf = CellBuilder::new().build();
        let mut mid = CellBuilder::new();
        mid.store_ref(leaf.to_ref()).unwrap();
        let mid = mid.build();
        assert_eq!(mid.depth(), 1);

        let mut root = CellBuilder::new();
        root.store_ref(leaf.to_ref()).unwrap().store_ref(mid.to_ref()).unwrap();
        assert_eq!(root.build().depth(), 2);
    }

    #[test]
    fn test_limits() {
        let mut builder = CellBuilder::new();
        assert!(builder.store_uint(4, 2).is_err());
        for _ in 0..MAX_REFS {
            builder.store_ref(CellRef { hash: [0; 32], depth: 0 }).unwrap();
        }
        assert!(builder.store_ref(CellRef { hash: [0; 32], depth: 0 }).is_err());

        let mut full = CellBuilder::new();
        for _ in 0..MAX_BITS {
            full.store_bit(false).unwrap();
        }
        assert!(full.store_bit(true).is_err());
    }
}
