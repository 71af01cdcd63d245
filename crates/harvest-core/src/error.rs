//! Error types for Harvest farm operations

use crate::types::{AccountId, Amount, BlockNumber, PoolIndex, TokenId};
use thiserror::Error;

/// Result type alias for farm operations
pub type Result<T> = std::result::Result<T, FarmError>;

/// Errors raised by a token collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Sender does not hold enough tokens
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    /// Account is frozen by the token
    #[error("account {0} is frozen")]
    Frozen(AccountId),

    /// Collaborator-specific failure
    #[error("{0}")]
    Rejected(String),
}

/// Errors that can occur while operating the farm.
///
/// Every variant aborts the operation that raised it; the farm ledger is left
/// exactly as it was before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FarmError {
    // === Lifecycle ===
    /// Farm has not been initialized with a reward token yet
    #[error("farm is not initialized")]
    NotInitialized,

    /// initialize_farm called a second time
    #[error("farm is already initialized")]
    AlreadyInitialized,

    /// Farm reached its end block
    #[error("farm is closed: current block {current}, end block {end}")]
    FarmClosed { current: BlockNumber, end: BlockNumber },

    // === Access control ===
    /// Caller is not the farm owner
    #[error("caller {caller} is not authorized")]
    Unauthorized { caller: AccountId },

    // === Emission ===
    /// Funding amount would leave a fractional last block
    #[error("funding amount {amount} is not divisible by reward per block {reward_per_block}")]
    IndivisibleFunding { amount: Amount, reward_per_block: Amount },

    /// Reward rate of zero
    #[error("reward per block must be greater than zero")]
    InvalidRewardRate,

    // === Pools and positions ===
    /// Pool index out of range
    #[error("pool {0} does not exist")]
    PoolNotFound(PoolIndex),

    /// Fee above 1000 per-mille
    #[error("fee {fee} exceeds 1000 per-mille")]
    InvalidFee { fee: u32 },

    /// Withdrawal larger than the recorded deposit
    #[error("cannot withdraw {requested} from pool {pool}: deposited {deposited}")]
    InsufficientDeposit {
        pool: PoolIndex,
        requested: Amount,
        deposited: Amount,
    },

    // === Collaborators ===
    /// Token transfer failed
    #[error("transfer of token {token} failed: {reason}")]
    TransferFailed { token: TokenId, reason: TransferError },

    // === Arithmetic ===
    /// Fixed-point computation overflowed
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
}

impl FarmError {
    /// Stable numeric code for the error kind
    pub fn code(&self) -> u32 {
        match self {
            Self::NotInitialized => 1001,
            Self::AlreadyInitialized => 1002,
            Self::FarmClosed { .. } => 1003,
            Self::Unauthorized { .. } => 1004,
            Self::IndivisibleFunding { .. } => 1005,
            Self::InvalidRewardRate => 1006,
            Self::PoolNotFound(_) => 1007,
            Self::InvalidFee { .. } => 1008,
            Self::InsufficientDeposit { .. } => 1009,
            Self::TransferFailed { .. } => 1010,
            Self::Overflow(_) => 9999,
        }
    }

    /// Errors caused by caller input that a corrected request can avoid
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::IndivisibleFunding { .. }
                | Self::InvalidRewardRate
                | Self::PoolNotFound(_)
                | Self::InvalidFee { .. }
                | Self::InsufficientDeposit { .. }
        )
    }
}
