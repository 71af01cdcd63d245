//! Core type definitions for the Harvest farm
//!
//! Accounts and tokens are opaque 32-byte identifiers. Amounts are always
//! integers in the smallest unit of their token and time is a block number.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Block height as reported by the block source
pub type BlockNumber = u64;

/// Token amount in the token's smallest unit
pub type Amount = u128;

/// Index of a pool in the registry (stable, never reused)
pub type PoolIndex = usize;

/// AccountId - identity of a caller or token holder
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct AccountId {
    id: [u8; 32],
}

impl AccountId {
    /// Create an AccountId from raw bytes
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive a deterministic AccountId from a human label (BLAKE3)
    pub fn from_label(label: &str) -> Self {
        Self {
            id: *blake3::hash(label.as_bytes()).as_bytes(),
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Parse from hex string
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut id = [0u8; 32];
        hex::decode_to_slice(s, &mut id)?;
        Ok(Self { id })
    }

    /// The null account
    pub const ZERO: Self = Self { id: [0u8; 32] };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// TokenId - identity of a fungible token contract
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TokenId {
    id: [u8; 32],
}

impl TokenId {
    pub fn new(id: [u8; 32]) -> Self {
        Self { id }
    }

    /// Derive a TokenId from the token symbol
    pub fn from_symbol(symbol: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"token:");
        hasher.update(symbol.as_bytes());
        Self {
            id: *hasher.finalize().as_bytes(),
        }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.id
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.id)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.to_hex()[..16])
    }
}
