//! # User Ledger
//!
//! Per (pool, account) staked amount and reward-debt checkpoint.
//!
//! `pending = amount * acc / SCALE - reward_debt`. Every change of `amount`
//! must pay out the pending reward first and then re-baseline the debt to
//! the current accumulator.

use harvest_core::math;
use harvest_core::{AccountId, Amount, FarmError, PoolIndex, Result, U256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ledger key
pub type PositionKey = (PoolIndex, AccountId);

/// A staker's position in one pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Staked deposit token (post transfer tax)
    pub amount: Amount,
    /// Accrued value already accounted for, scaled like the accumulator
    /// product so it never has to fit an `Amount`
    pub reward_debt: U256,
}

impl Position {
    /// Reward owed at accumulator value `acc`
    pub fn pending(&self, acc: U256) -> Result<Amount> {
        math::pending(math::accrued(self.amount, acc)?, self.reward_debt)
    }

    /// Checkpoint the debt at `acc`
    pub fn rebaseline(&mut self, acc: U256) -> Result<()> {
        self.reward_debt = math::accrued(self.amount, acc)?;
        Ok(())
    }

    pub fn credit(&mut self, amount: Amount) -> Result<()> {
        self.amount = self
            .amount
            .checked_add(amount)
            .ok_or(FarmError::Overflow("position amount"))?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.amount == 0 && self.reward_debt.is_zero()
    }
}

/// All positions, created lazily on first deposit
#[derive(Clone, Debug, Default)]
pub struct UserLedger {
    positions: HashMap<PositionKey, Position>,
}

impl UserLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position for a key, zero if the account never staked
    pub fn position(&self, pool: PoolIndex, account: &AccountId) -> Position {
        self.positions
            .get(&(pool, *account))
            .copied()
            .unwrap_or_default()
    }

    /// Staked amount
    pub fn deposited(&self, pool: PoolIndex, account: &AccountId) -> Amount {
        self.position(pool, account).amount
    }

    /// Mutable position, created on first access
    pub fn entry(&mut self, pool: PoolIndex, account: &AccountId) -> &mut Position {
        self.positions.entry((pool, *account)).or_default()
    }

    /// Stakers of a pool with their positions
    pub fn stakers(&self, pool: PoolIndex) -> impl Iterator<Item = (&AccountId, &Position)> {
        self.positions
            .iter()
            .filter(move |((p, _), pos)| *p == pool && pos.amount > 0)
            .map(|((_, account), pos)| (account, pos))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Saved state of one slot for rollback
    pub(crate) fn checkpoint(&self, key: PositionKey) -> (PositionKey, Option<Position>) {
        (key, self.positions.get(&key).copied())
    }

    pub(crate) fn restore(&mut self, saved: (PositionKey, Option<Position>)) {
        match saved {
            (key, Some(position)) => {
                self.positions.insert(key, position);
            }
            (key, None) => {
                self.positions.remove(&key);
            }
        }
    }
}
