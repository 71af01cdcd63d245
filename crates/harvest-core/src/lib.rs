//! # Harvest Core
//!
//! Building blocks shared by the Harvest reward farm:
//! - identifiers (`AccountId`, `TokenId`) and amount/block aliases
//! - the `FarmError` taxonomy
//! - fixed-point reward-per-share math
//! - the `TokenVault` collaborator seam and an in-memory token
//! - the `BlockSource` clock seam
//!
//! ```text
//!   caller ──► Farm ──► TokenVault (deposit token, per pool)
//!               │  └──► TokenVault (reward token)
//!               └─────► BlockSource
//! ```

pub mod clock;
pub mod error;
pub mod math;
pub mod token;
pub mod types;

pub use clock::*;
pub use error::*;
pub use math::U256;
pub use token::*;
pub use types::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::{BlockSource, ManualClock};
    pub use crate::error::{FarmError, Result, TransferError};
    pub use crate::math::{ACC_SCALE, FEE_DENOMINATOR, MAX_FEE, U256};
    pub use crate::token::{MemoryToken, MemoryVault, TokenVault};
    pub use crate::types::*;
}
