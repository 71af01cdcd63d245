//! # Fixed-Point Accumulator Math
//!
//! Reward-per-share arithmetic. The accumulator and the accrued values are
//! [`U256`] scaled by [`ACC_SCALE`]: a dust-sized stake early on drives the
//! accumulator far past what `amount * acc` can hold in a `u128`. Only the
//! difference `accrued - reward_debt` is narrowed back to an [`Amount`].
//! Every division truncates toward zero so the farm never owes more than it
//! emitted.
//!
//! ```text
//! acc'     = acc + reward * SCALE / staked
//! accrued  = amount * acc / SCALE
//! pending  = accrued - reward_debt
//! ```

use crate::error::{FarmError, Result};
use crate::types::{Amount, BlockNumber};

pub use primitive_types::U256;

/// Accumulator precision (1e12)
pub const ACC_SCALE: u128 = 1_000_000_000_000;

/// Fee denominator: fees are expressed per-mille
pub const FEE_DENOMINATOR: u128 = 1_000;

/// Largest accepted fee (100%)
pub const MAX_FEE: u32 = 1_000;

/// Reward emitted to one pool over a block span.
///
/// `reward_per_block * blocks * weight / total_weight`, truncated. A zero
/// total weight emits nothing.
pub fn pool_reward(
    reward_per_block: Amount,
    blocks: BlockNumber,
    weight: u64,
    total_weight: u64,
) -> Result<Amount> {
    if total_weight == 0 {
        return Ok(0);
    }
    reward_per_block
        .checked_mul(blocks as u128)
        .and_then(|r| r.checked_mul(weight as u128))
        .map(|r| r / total_weight as u128)
        .ok_or(FarmError::Overflow("pool reward"))
}

/// Accumulator increment for `reward` spread over `staked` units
pub fn reward_per_share(reward: Amount, staked: Amount) -> Result<U256> {
    if staked == 0 {
        return Ok(U256::zero());
    }
    U256::from(reward)
        .checked_mul(U256::from(ACC_SCALE))
        .map(|r| r / U256::from(staked))
        .ok_or(FarmError::Overflow("reward per share"))
}

/// Value accrued by `amount` staked units at accumulator value `acc`
pub fn accrued(amount: Amount, acc: U256) -> Result<U256> {
    U256::from(amount)
        .checked_mul(acc)
        .map(|r| r / U256::from(ACC_SCALE))
        .ok_or(FarmError::Overflow("accrued reward"))
}

/// Pending reward given an accrued value and the stored checkpoint.
///
/// The checkpoint never exceeds the accrued value while positions are
/// re-baselined on every mutation; saturate anyway so a projection can
/// never underflow.
pub fn pending(accrued: U256, reward_debt: U256) -> Result<Amount> {
    debug_assert!(reward_debt <= accrued, "reward debt above accrued value");
    to_amount(accrued.saturating_sub(reward_debt), "pending reward")
}

/// Narrow a wide value to an [`Amount`]
pub fn to_amount(value: U256, what: &'static str) -> Result<Amount> {
    if value > U256::from(u128::MAX) {
        return Err(FarmError::Overflow(what));
    }
    Ok(value.as_u128())
}

/// Per-mille fee taken from `amount`
pub fn fee_of(amount: Amount, fee_per_mille: u32) -> Result<Amount> {
    amount
        .checked_mul(fee_per_mille as u128)
        .map(|f| f / FEE_DENOMINATOR)
        .ok_or(FarmError::Overflow("fee"))
}

/// Split `amount` into (net, fee)
pub fn split_fee(amount: Amount, fee_per_mille: u32) -> Result<(Amount, Amount)> {
    let fee = fee_of(amount, fee_per_mille)?;
    Ok((amount - fee, fee))
}
