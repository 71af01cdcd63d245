//! # Pool Registry
//!
//! Append-only list of staking pools addressed by index. Each pool carries
//! its own reward-per-share accumulator and receives
//! `weight / total_weight` of the per-block emission.
//!
//! A pool must be settled right before anything reads or changes its staked
//! total or any position's reward debt in it.

use crate::emission::EmissionSchedule;
use harvest_core::math::{self, MAX_FEE};
use harvest_core::{Amount, BlockNumber, FarmError, PoolIndex, Result, TokenId, TokenVault, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Pool state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    /// Token staked in this pool
    pub deposit_token: TokenId,
    /// Allocation weight
    pub alloc_point: u64,
    /// Block up to which the accumulator is settled
    pub last_reward_block: BlockNumber,
    /// Reward per staked unit, scaled by `ACC_SCALE`
    pub acc_reward_per_share: U256,
    /// Deposit token held for stakers (post transfer tax)
    pub total_staked: Amount,
    /// Fee on principal leaving the pool, per-mille
    pub withdrawal_fee: u32,
    /// Fee on reward payouts, per-mille
    pub claim_fee: u32,
}

impl PoolInfo {
    /// Accumulator value and settle block as of `current`, without mutating.
    fn accumulate(
        &self,
        schedule: &EmissionSchedule,
        total_alloc_point: u64,
        current: BlockNumber,
    ) -> Result<(U256, BlockNumber)> {
        let upto = schedule.reward_eligible_up_to(current);
        if self.last_reward_block >= upto {
            return Ok((self.acc_reward_per_share, self.last_reward_block));
        }
        if self.total_staked == 0 {
            return Ok((self.acc_reward_per_share, upto));
        }

        let reward = math::pool_reward(
            schedule.reward_per_block,
            upto - self.last_reward_block,
            self.alloc_point,
            total_alloc_point,
        )?;
        let acc = self
            .acc_reward_per_share
            .checked_add(math::reward_per_share(reward, self.total_staked)?)
            .ok_or(FarmError::Overflow("accumulator"))?;
        Ok((acc, upto))
    }

    /// Spread `amount` of already-emitted reward over the current stakers.
    ///
    /// Returns false if nobody is staked to receive it.
    pub fn redistribute(&mut self, amount: Amount) -> Result<bool> {
        if amount == 0 || self.total_staked == 0 {
            return Ok(false);
        }
        self.acc_reward_per_share = self
            .acc_reward_per_share
            .checked_add(math::reward_per_share(amount, self.total_staked)?)
            .ok_or(FarmError::Overflow("accumulator"))?;
        Ok(true)
    }
}

/// Reject fees above 100%
pub fn validate_fee(fee: u32) -> Result<()> {
    if fee > MAX_FEE {
        return Err(FarmError::InvalidFee { fee });
    }
    Ok(())
}

/// Ordered pools plus the vault holding each pool's deposit token
#[derive(Default)]
pub struct PoolRegistry {
    pools: Vec<PoolInfo>,
    vaults: Vec<Arc<dyn TokenVault>>,
    total_alloc_point: u64,
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("pools", &self.pools)
            .field("total_alloc_point", &self.total_alloc_point)
            .finish()
    }
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn total_alloc_point(&self) -> u64 {
        self.total_alloc_point
    }

    pub fn pools(&self) -> &[PoolInfo] {
        &self.pools
    }

    pub fn get(&self, index: PoolIndex) -> Result<&PoolInfo> {
        self.pools.get(index).ok_or(FarmError::PoolNotFound(index))
    }

    pub fn get_mut(&mut self, index: PoolIndex) -> Result<&mut PoolInfo> {
        self.pools.get_mut(index).ok_or(FarmError::PoolNotFound(index))
    }

    pub fn vault(&self, index: PoolIndex) -> Result<Arc<dyn TokenVault>> {
        self.vaults
            .get(index)
            .cloned()
            .ok_or(FarmError::PoolNotFound(index))
    }

    /// Append a pool. The caller settles existing pools first so they are
    /// frozen against the old total weight.
    pub fn add(
        &mut self,
        vault: Arc<dyn TokenVault>,
        alloc_point: u64,
        withdrawal_fee: u32,
        claim_fee: u32,
        first_reward_block: BlockNumber,
    ) -> Result<PoolIndex> {
        validate_fee(withdrawal_fee)?;
        validate_fee(claim_fee)?;
        let total = self
            .total_alloc_point
            .checked_add(alloc_point)
            .ok_or(FarmError::Overflow("total allocation"))?;

        self.pools.push(PoolInfo {
            deposit_token: vault.token(),
            alloc_point,
            last_reward_block: first_reward_block,
            acc_reward_per_share: U256::zero(),
            total_staked: 0,
            withdrawal_fee,
            claim_fee,
        });
        self.vaults.push(vault);
        self.total_alloc_point = total;
        Ok(self.pools.len() - 1)
    }

    /// Change a pool's weight and fees. The caller settles all pools first.
    pub fn set(
        &mut self,
        index: PoolIndex,
        alloc_point: u64,
        withdrawal_fee: u32,
        claim_fee: u32,
    ) -> Result<()> {
        validate_fee(withdrawal_fee)?;
        validate_fee(claim_fee)?;
        let total = self.total_alloc_point;
        let pool = self.get_mut(index)?;
        let total = (total - pool.alloc_point)
            .checked_add(alloc_point)
            .ok_or(FarmError::Overflow("total allocation"))?;

        pool.alloc_point = alloc_point;
        pool.withdrawal_fee = withdrawal_fee;
        pool.claim_fee = claim_fee;
        self.total_alloc_point = total;
        Ok(())
    }

    /// Advance one pool's accumulator to `current`. Returns whether anything
    /// changed.
    pub fn settle(
        &mut self,
        index: PoolIndex,
        schedule: &EmissionSchedule,
        current: BlockNumber,
    ) -> Result<bool> {
        let total = self.total_alloc_point;
        let pool = self.get_mut(index)?;
        let (acc, upto) = pool.accumulate(schedule, total, current)?;
        if upto == pool.last_reward_block && acc == pool.acc_reward_per_share {
            return Ok(false);
        }

        tracing::debug!(
            pool = index,
            from = pool.last_reward_block,
            to = upto,
            acc = %acc,
            staked = pool.total_staked,
            "settled pool"
        );
        pool.acc_reward_per_share = acc;
        pool.last_reward_block = upto;
        Ok(true)
    }

    /// Settle every pool
    pub fn settle_all(&mut self, schedule: &EmissionSchedule, current: BlockNumber) -> Result<()> {
        for index in 0..self.pools.len() {
            self.settle(index, schedule, current)?;
        }
        Ok(())
    }

    /// Accumulator a settle at `current` would produce
    pub fn projected_acc(
        &self,
        index: PoolIndex,
        schedule: &EmissionSchedule,
        current: BlockNumber,
    ) -> Result<U256> {
        let (acc, _) = self
            .get(index)?
            .accumulate(schedule, self.total_alloc_point, current)?;
        Ok(acc)
    }

    /// Copy of the pool records for rollback
    pub(crate) fn checkpoint(&self) -> (Vec<PoolInfo>, u64) {
        (self.pools.clone(), self.total_alloc_point)
    }

    /// Restore a checkpoint taken by [`PoolRegistry::checkpoint`]
    pub(crate) fn restore(&mut self, pools: Vec<PoolInfo>, total_alloc_point: u64) {
        self.vaults.truncate(pools.len());
        self.pools = pools;
        self.total_alloc_point = total_alloc_point;
    }
}
