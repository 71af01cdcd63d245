//! # Emission Schedule
//!
//! Owns the reward rate, the funded budget and the block window during which
//! rewards flow.
//!
//! ```text
//!  start                last change                    end
//!    │◄─ rewards_before ──►│◄─ rate * (end - change) ──►│
//!    └──────────────── budget = funded - dust swept ─────┘
//! ```
//!
//! The end block is always derived from the budget:
//! `end = last_change + (budget - rewards_before) / rate`. Truncation rounds
//! the end down so the schedule never promises more than it holds. A rate
//! change sweeps the sub-rate remainder (dust) out of the budget; funding must
//! come in whole blocks.

use harvest_core::{Amount, BlockNumber, FarmError, Result};
use serde::{Deserialize, Serialize};

/// Lifecycle phase, derived from the current block on every access
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FarmPhase {
    /// No reward token configured yet
    Uninitialized,
    /// Configured, start block not reached
    Initialized,
    /// Rewards are flowing
    Active,
    /// End block reached
    Closed,
}

impl FarmPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

/// Global emission state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionSchedule {
    /// Reward emitted per block across all pools
    pub reward_per_block: Amount,
    /// First block that earns rewards
    pub start_block: BlockNumber,
    /// First block that no longer earns rewards
    pub end_block: BlockNumber,
    /// Block of the last rate change (start block until the first change)
    pub last_emission_change: BlockNumber,
    /// Rewards committed before the last rate change
    pub rewards_before_last_change: Amount,
    /// Cumulative reward token received through funding
    pub total_funded: Amount,
    /// Cumulative dust handed to the admin wallet on rate changes
    pub dust_swept: Amount,
    /// Cumulative reward paid out to stakers (claim fees included)
    pub paid_out: Amount,
    /// Whether the schedule has been configured
    pub initialized: bool,
}

impl EmissionSchedule {
    /// Configured schedule with no funding yet
    pub fn new(reward_per_block: Amount, start_block: BlockNumber) -> Result<Self> {
        if reward_per_block == 0 {
            return Err(FarmError::InvalidRewardRate);
        }
        Ok(Self {
            reward_per_block,
            start_block,
            end_block: start_block,
            last_emission_change: start_block,
            initialized: true,
            ..Self::default()
        })
    }

    /// Placeholder for a farm that will be initialized later
    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(FarmError::NotInitialized)
        }
    }

    /// Phase at `current`
    pub fn phase(&self, current: BlockNumber) -> FarmPhase {
        if !self.initialized {
            FarmPhase::Uninitialized
        } else if current >= self.end_block && current >= self.start_block {
            FarmPhase::Closed
        } else if current < self.start_block {
            FarmPhase::Initialized
        } else {
            FarmPhase::Active
        }
    }

    pub fn is_closed(&self, current: BlockNumber) -> bool {
        self.phase(current) == FarmPhase::Closed
    }

    /// Last block (exclusive) whose emission is eligible at `current`
    pub fn reward_eligible_up_to(&self, current: BlockNumber) -> BlockNumber {
        current.min(self.end_block)
    }

    /// Reward the schedule may still distribute in total
    pub fn budget(&self) -> Amount {
        self.total_funded - self.dust_swept
    }

    /// Total emitted from start up to `current`
    pub fn emitted_up_to(&self, current: BlockNumber) -> Result<Amount> {
        let upto = current.max(self.start_block).min(self.end_block);
        let since_change = upto.saturating_sub(self.last_emission_change);
        self.reward_per_block
            .checked_mul(since_change as u128)
            .and_then(|r| r.checked_add(self.rewards_before_last_change))
            .ok_or(FarmError::Overflow("emitted rewards"))
    }

    /// Emitted but not yet paid out
    pub fn total_pending(&self, current: BlockNumber) -> Result<Amount> {
        Ok(self.emitted_up_to(current)?.saturating_sub(self.paid_out))
    }

    /// Validate a funding request before any token moves
    pub fn check_fundable(&self, current: BlockNumber, amount: Amount) -> Result<()> {
        self.ensure_initialized()?;
        if current >= self.end_block {
            return Err(FarmError::FarmClosed {
                current,
                end: self.end_block,
            });
        }
        if amount % self.reward_per_block != 0 {
            return Err(FarmError::IndivisibleFunding {
                amount,
                reward_per_block: self.reward_per_block,
            });
        }
        Ok(())
    }

    /// Credit reward actually received by custody and extend the window.
    ///
    /// Returns the new end block.
    pub fn credit_funding(&mut self, received: Amount) -> Result<BlockNumber> {
        let mut next = self.clone();
        next.total_funded = self
            .total_funded
            .checked_add(received)
            .ok_or(FarmError::Overflow("total funded"))?;
        next.recompute_end()?;
        *self = next;
        Ok(self.end_block)
    }

    /// Switch to `new_rate` at `current`.
    ///
    /// Commits the rewards emitted since the previous change, moves the change
    /// marker to `current` clamped into `[start, end]` and recomputes the end
    /// block. Returns the dust that no longer fits a whole block; the caller
    /// sweeps it out of custody.
    pub fn change_rate(&mut self, current: BlockNumber, new_rate: Amount) -> Result<Amount> {
        self.ensure_initialized()?;
        if new_rate == 0 {
            return Err(FarmError::InvalidRewardRate);
        }

        let effective = current.max(self.start_block).min(self.end_block);
        let mut next = self.clone();
        next.rewards_before_last_change = self.emitted_up_to(effective)?;
        next.last_emission_change = effective;
        next.reward_per_block = new_rate;

        let dust = next.recompute_end()?;
        next.dust_swept = next
            .dust_swept
            .checked_add(dust)
            .ok_or(FarmError::Overflow("dust swept"))?;
        *self = next;
        Ok(dust)
    }

    /// Record reward leaving custody to a staker
    pub fn record_payout(&mut self, amount: Amount) {
        self.paid_out += amount;
    }

    /// Recompute the end block from the budget; returns the remainder that
    /// does not fill a whole block.
    fn recompute_end(&mut self) -> Result<Amount> {
        let remaining = self.budget().saturating_sub(self.rewards_before_last_change);
        let blocks = BlockNumber::try_from(remaining / self.reward_per_block)
            .map_err(|_| FarmError::Overflow("end block"))?;
        self.end_block = self
            .last_emission_change
            .checked_add(blocks)
            .ok_or(FarmError::Overflow("end block"))?;
        Ok(remaining % self.reward_per_block)
    }
}
