//! # Farm
//!
//! Orchestrates the emission schedule, the pool registry and the user ledger
//! against the token collaborators.
//!
//! Every state-changing call follows the same order:
//!
//! 1. read the current block
//! 2. settle the touched pool (or all pools for global changes)
//! 3. compute pending rewards through the accumulator
//! 4. plan outbound transfers and check custody can cover them
//! 5. pull inbound tokens, measuring what actually arrived
//! 6. push outbound tokens
//! 7. update positions and re-baseline reward debt
//!
//! An emergency withdrawal skips step 2 so the span it leaves unsettled
//! lands on the remaining stakers. A failure at any step restores the farm
//! state captured before step 2.

use crate::emission::{EmissionSchedule, FarmPhase};
use crate::ledger::{Position, PositionKey, UserLedger};
use crate::pool::{validate_fee, PoolInfo, PoolRegistry};
use harvest_core::math;
use harvest_core::{
    AccountId, Amount, BlockNumber, BlockSource, FarmError, PoolIndex, Result, TokenId,
    TokenVault, TransferError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Construction parameters. A farm built without a reward vault starts
/// uninitialized and must go through [`Farm::initialize_farm`].
#[derive(Clone)]
pub struct FarmParams {
    pub reward_vault: Option<Arc<dyn TokenVault>>,
    pub reward_per_block: Amount,
    pub start_block: BlockNumber,
    pub admin_wallet: AccountId,
}

impl FarmParams {
    pub fn new(
        reward_vault: Arc<dyn TokenVault>,
        reward_per_block: Amount,
        start_block: BlockNumber,
        admin_wallet: AccountId,
    ) -> Self {
        Self {
            reward_vault: Some(reward_vault),
            reward_per_block,
            start_block,
            admin_wallet,
        }
    }

    /// Deferred configuration
    pub fn empty() -> Self {
        Self {
            reward_vault: None,
            reward_per_block: 0,
            start_block: 0,
            admin_wallet: AccountId::ZERO,
        }
    }
}

/// Token movements produced by a staking operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Deposit token credited to or removed from the position
    pub principal: Amount,
    /// Reward sent to the staker, net of the claim fee
    pub reward: Amount,
    /// Claim fee sent to the admin wallet
    pub claim_fee: Amount,
    /// Withdrawal fee sent to the admin wallet
    pub withdrawal_fee: Amount,
    /// Reward given up by an emergency withdrawal
    pub forfeited: Amount,
}

/// Read-only view of a staker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakerView {
    pub account: AccountId,
    pub deposited: Amount,
    pub pending: Amount,
}

/// Point-in-time view of the farm
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmSnapshot {
    pub current_block: BlockNumber,
    pub phase: FarmPhase,
    pub owner: AccountId,
    pub admin_wallet: AccountId,
    pub reward_token: Option<TokenId>,
    pub emission: EmissionSchedule,
    pub pools: Vec<PoolInfo>,
    pub total_alloc_point: u64,
    pub total_pending: Amount,
}

struct Outbound {
    vault: Arc<dyn TokenVault>,
    to: AccountId,
    amount: Amount,
}

/// Outbound transfers of one operation
#[derive(Default)]
struct TransferPlan {
    outbound: Vec<Outbound>,
}

impl TransferPlan {
    fn push(&mut self, vault: &Arc<dyn TokenVault>, to: AccountId, amount: Amount) {
        if amount > 0 {
            self.outbound.push(Outbound {
                vault: Arc::clone(vault),
                to,
                amount,
            });
        }
    }

    /// Check every recipient is accepted and custody holds enough of every
    /// token before anything moves
    fn preflight(&self) -> Result<()> {
        let mut needed: HashMap<TokenId, (&Arc<dyn TokenVault>, Amount)> = HashMap::new();
        for transfer in &self.outbound {
            transfer
                .vault
                .check_push(&transfer.to, transfer.amount)
                .map_err(|reason| FarmError::TransferFailed {
                    token: transfer.vault.token(),
                    reason,
                })?;
            let entry = needed
                .entry(transfer.vault.token())
                .or_insert((&transfer.vault, 0));
            entry.1 += transfer.amount;
        }

        for (token, (vault, amount)) in needed {
            let available = vault.custody_balance();
            if available < amount {
                return Err(FarmError::TransferFailed {
                    token,
                    reason: TransferError::InsufficientBalance {
                        needed: amount,
                        available,
                    },
                });
            }
        }
        Ok(())
    }

    fn dispatch(self) -> Result<()> {
        for transfer in self.outbound {
            let token = transfer.vault.token();
            let received = transfer
                .vault
                .push(&transfer.to, transfer.amount)
                .map_err(|reason| FarmError::TransferFailed { token, reason })?;
            debug!(%token, to = %transfer.to, amount = transfer.amount, received, "sent");
        }
        Ok(())
    }
}

/// Pull `amount` into custody and return what custody actually gained
fn pull_observed(vault: &Arc<dyn TokenVault>, from: &AccountId, amount: Amount) -> Result<Amount> {
    let token = vault.token();
    let before = vault.custody_balance();
    let reported = vault
        .pull(from, amount)
        .map_err(|reason| FarmError::TransferFailed { token, reason })?;
    let observed = vault.custody_balance().saturating_sub(before);

    if reported != observed {
        warn!(%token, requested = amount, reported, observed, "vault reported a different inbound amount");
    }
    Ok(observed)
}

/// State captured before an operation
struct Checkpoint {
    schedule: EmissionSchedule,
    pools: (Vec<PoolInfo>, u64),
    position: Option<(PositionKey, Option<Position>)>,
}

/// Multi-pool reward farm
pub struct Farm {
    owner: AccountId,
    admin_wallet: AccountId,
    reward_vault: Option<Arc<dyn TokenVault>>,
    clock: Arc<dyn BlockSource>,
    schedule: EmissionSchedule,
    registry: PoolRegistry,
    ledger: UserLedger,
}

impl fmt::Debug for Farm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Farm")
            .field("owner", &self.owner)
            .field("admin_wallet", &self.admin_wallet)
            .field("schedule", &self.schedule)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Farm {
    /// Create a farm owned by `owner`
    pub fn new(owner: AccountId, clock: Arc<dyn BlockSource>, params: FarmParams) -> Result<Self> {
        let schedule = match params.reward_vault {
            Some(_) => EmissionSchedule::new(params.reward_per_block, params.start_block)?,
            None => EmissionSchedule::uninitialized(),
        };

        Ok(Self {
            owner,
            admin_wallet: params.admin_wallet,
            reward_vault: params.reward_vault,
            clock,
            schedule,
            registry: PoolRegistry::new(),
            ledger: UserLedger::new(),
        })
    }

    /// Configure a farm created with [`FarmParams::empty`]. Allowed once.
    pub fn initialize_farm(
        &mut self,
        caller: &AccountId,
        reward_vault: Arc<dyn TokenVault>,
        reward_per_block: Amount,
        start_block: BlockNumber,
        admin_wallet: AccountId,
    ) -> Result<()> {
        self.only_owner(caller)?;
        if self.schedule.initialized {
            return Err(FarmError::AlreadyInitialized);
        }

        self.schedule = EmissionSchedule::new(reward_per_block, start_block)?;
        info!(
            reward_token = %reward_vault.token(),
            reward_per_block,
            start_block,
            admin = %admin_wallet,
            "farm initialized"
        );
        self.reward_vault = Some(reward_vault);
        self.admin_wallet = admin_wallet;
        Ok(())
    }

    // === Admin operations ===

    /// Add a staking pool for `vault`'s token
    pub fn add_pool(
        &mut self,
        caller: &AccountId,
        vault: Arc<dyn TokenVault>,
        alloc_point: u64,
        withdrawal_fee: u32,
        claim_fee: u32,
    ) -> Result<PoolIndex> {
        self.only_owner(caller)?;
        self.schedule.ensure_initialized()?;
        validate_fee(withdrawal_fee)?;
        validate_fee(claim_fee)?;
        let current = self.current_block();

        self.transact(None, |farm| {
            farm.registry.settle_all(&farm.schedule, current)?;
            let first_reward_block = current.max(farm.schedule.start_block);
            let token = vault.token();
            let index = farm.registry.add(
                vault,
                alloc_point,
                withdrawal_fee,
                claim_fee,
                first_reward_block,
            )?;

            info!(
                pool = index,
                %token,
                alloc_point,
                withdrawal_fee,
                claim_fee,
                total_alloc_point = farm.registry.total_alloc_point(),
                "pool added"
            );
            Ok(index)
        })
    }

    /// Change a pool's weight and fees
    pub fn set_pool(
        &mut self,
        caller: &AccountId,
        pool: PoolIndex,
        alloc_point: u64,
        withdrawal_fee: u32,
        claim_fee: u32,
    ) -> Result<()> {
        self.only_owner(caller)?;
        self.schedule.ensure_initialized()?;
        let current = self.current_block();

        self.transact(None, |farm| {
            farm.registry.get(pool)?;
            farm.registry.settle_all(&farm.schedule, current)?;
            farm.registry
                .set(pool, alloc_point, withdrawal_fee, claim_fee)?;

            info!(
                pool,
                alloc_point,
                withdrawal_fee,
                claim_fee,
                total_alloc_point = farm.registry.total_alloc_point(),
                "pool updated"
            );
            Ok(())
        })
    }

    /// Add reward token to the schedule. Returns the new end block.
    pub fn fund(&mut self, caller: &AccountId, amount: Amount) -> Result<BlockNumber> {
        self.only_owner(caller)?;
        let current = self.current_block();
        self.schedule.check_fundable(current, amount)?;
        let vault = self.reward_vault()?;
        let funder = *caller;

        self.transact(None, |farm| {
            farm.registry.settle_all(&farm.schedule, current)?;
            let received = pull_observed(&vault, &funder, amount)?;
            let end_block = farm.schedule.credit_funding(received)?;

            info!(amount, received, end_block, "farm funded");
            Ok(end_block)
        })
    }

    /// Switch the emission rate. Returns the dust swept to the admin wallet.
    pub fn change_reward_per_block(&mut self, caller: &AccountId, reward_per_block: Amount) -> Result<Amount> {
        self.only_owner(caller)?;
        self.schedule.ensure_initialized()?;
        let current = self.current_block();
        let vault = self.reward_vault()?;
        let admin = self.admin_wallet;

        self.transact(None, |farm| {
            farm.registry.settle_all(&farm.schedule, current)?;
            let dust = farm.schedule.change_rate(current, reward_per_block)?;

            let mut plan = TransferPlan::default();
            plan.push(&vault, admin, dust);
            plan.preflight()?;
            plan.dispatch()?;

            info!(
                reward_per_block,
                end_block = farm.schedule.end_block,
                rewards_before = farm.schedule.rewards_before_last_change,
                dust,
                "reward rate changed"
            );
            Ok(dust)
        })
    }

    /// Redirect fees and dust to a new wallet
    pub fn change_admin_wallet(&mut self, caller: &AccountId, admin_wallet: AccountId) -> Result<()> {
        self.only_owner(caller)?;
        info!(from = %self.admin_wallet, to = %admin_wallet, "admin wallet changed");
        self.admin_wallet = admin_wallet;
        Ok(())
    }

    /// Hand the owner role to another account
    pub fn transfer_ownership(&mut self, caller: &AccountId, owner: AccountId) -> Result<()> {
        self.only_owner(caller)?;
        info!(from = %self.owner, to = %owner, "ownership transferred");
        self.owner = owner;
        Ok(())
    }

    // === Staking operations ===

    /// Stake `amount` of the pool's token, harvesting pending reward.
    ///
    /// The position is credited with what custody actually received.
    pub fn deposit(&mut self, caller: &AccountId, pool: PoolIndex, amount: Amount) -> Result<Receipt> {
        self.schedule.ensure_initialized()?;
        let current = self.current_block();
        let account = *caller;

        self.transact(Some((pool, account)), |farm| {
            farm.registry.settle(pool, &farm.schedule, current)?;
            let info = farm.registry.get(pool)?.clone();
            let vault = farm.registry.vault(pool)?;
            let pending = farm
                .ledger
                .position(pool, &account)
                .pending(info.acc_reward_per_share)?;

            let mut plan = TransferPlan::default();
            let mut receipt = farm.plan_reward(&mut plan, account, pending, info.claim_fee)?;
            plan.preflight()?;

            if amount > 0 {
                receipt.principal = pull_observed(&vault, &account, amount)?;
            }
            plan.dispatch()?;
            farm.schedule.record_payout(pending);

            let position = farm.ledger.entry(pool, &account);
            position.credit(receipt.principal)?;
            position.rebaseline(info.acc_reward_per_share)?;
            let staked = position.amount;

            let pool_info = farm.registry.get_mut(pool)?;
            pool_info.total_staked = pool_info
                .total_staked
                .checked_add(receipt.principal)
                .ok_or(FarmError::Overflow("total staked"))?;

            info!(
                pool,
                account = %account,
                requested = amount,
                credited = receipt.principal,
                reward = receipt.reward,
                staked,
                "deposit"
            );
            Ok(receipt)
        })
    }

    /// Harvest pending reward without moving principal
    pub fn claim(&mut self, caller: &AccountId, pool: PoolIndex) -> Result<Receipt> {
        self.deposit(caller, pool, 0)
    }

    /// Unstake `amount`, harvesting pending reward. The withdrawal fee is
    /// taken from the principal sent back.
    pub fn withdraw(&mut self, caller: &AccountId, pool: PoolIndex, amount: Amount) -> Result<Receipt> {
        self.schedule.ensure_initialized()?;
        self.registry.get(pool)?;
        let deposited = self.ledger.deposited(pool, caller);
        if amount > deposited {
            return Err(FarmError::InsufficientDeposit {
                pool,
                requested: amount,
                deposited,
            });
        }
        let current = self.current_block();
        let account = *caller;
        let admin = self.admin_wallet;

        self.transact(Some((pool, account)), |farm| {
            farm.registry.settle(pool, &farm.schedule, current)?;
            let info = farm.registry.get(pool)?.clone();
            let vault = farm.registry.vault(pool)?;
            let pending = farm
                .ledger
                .position(pool, &account)
                .pending(info.acc_reward_per_share)?;

            let mut plan = TransferPlan::default();
            let mut receipt = farm.plan_reward(&mut plan, account, pending, info.claim_fee)?;
            let (net, fee) = math::split_fee(amount, info.withdrawal_fee)?;
            plan.push(&vault, account, net);
            plan.push(&vault, admin, fee);
            plan.preflight()?;
            plan.dispatch()?;
            farm.schedule.record_payout(pending);

            receipt.principal = amount;
            receipt.withdrawal_fee = fee;

            let position = farm.ledger.entry(pool, &account);
            position.amount -= amount;
            position.rebaseline(info.acc_reward_per_share)?;
            let remaining = position.amount;
            farm.registry.get_mut(pool)?.total_staked -= amount;

            info!(
                pool,
                account = %account,
                amount,
                fee,
                reward = receipt.reward,
                remaining,
                "withdraw"
            );
            Ok(receipt)
        })
    }

    /// Take the whole principal out and give up pending reward.
    ///
    /// The pool is not settled first. Its unsettled span reaches the
    /// remaining stakers at the next settle, spread over the reduced stake.
    /// Reward already settled into the position is spread over them right
    /// away. With nobody left both parts stay in custody unclaimable.
    pub fn emergency_withdraw(&mut self, caller: &AccountId, pool: PoolIndex) -> Result<Receipt> {
        self.schedule.ensure_initialized()?;
        let current = self.current_block();
        let account = *caller;
        let admin = self.admin_wallet;

        self.transact(Some((pool, account)), |farm| {
            let info = farm.registry.get(pool)?.clone();
            let vault = farm.registry.vault(pool)?;
            let position = farm.ledger.position(pool, &account);
            let settled = position.pending(info.acc_reward_per_share)?;
            let forfeited =
                position.pending(farm.registry.projected_acc(pool, &farm.schedule, current)?)?;
            let amount = position.amount;

            let (net, fee) = math::split_fee(amount, info.withdrawal_fee)?;
            let mut plan = TransferPlan::default();
            plan.push(&vault, account, net);
            plan.push(&vault, admin, fee);
            plan.preflight()?;
            plan.dispatch()?;

            *farm.ledger.entry(pool, &account) = Position::default();
            let pool_info = farm.registry.get_mut(pool)?;
            pool_info.total_staked -= amount;
            let redistributed = pool_info.redistribute(settled)?;

            warn!(
                pool,
                account = %account,
                amount,
                fee,
                forfeited,
                settled,
                redistributed,
                "emergency withdraw"
            );
            Ok(Receipt {
                principal: amount,
                withdrawal_fee: fee,
                forfeited,
                ..Receipt::default()
            })
        })
    }

    /// Settle every pool up to the current block
    pub fn mass_update_pools(&mut self) -> Result<()> {
        let current = self.current_block();
        self.transact(None, |farm| farm.registry.settle_all(&farm.schedule, current))
    }

    /// Settle one pool up to the current block
    pub fn update_pool(&mut self, pool: PoolIndex) -> Result<bool> {
        let current = self.current_block();
        self.transact(None, |farm| farm.registry.settle(pool, &farm.schedule, current))
    }

    // === Queries ===

    /// Reward claimable by `account` in `pool` at the current block
    pub fn pending(&self, pool: PoolIndex, account: &AccountId) -> Result<Amount> {
        let acc = self
            .registry
            .projected_acc(pool, &self.schedule, self.current_block())?;
        self.ledger.position(pool, account).pending(acc)
    }

    pub fn deposited(&self, pool: PoolIndex, account: &AccountId) -> Amount {
        self.ledger.deposited(pool, account)
    }

    /// Stakers of a pool with their pending reward
    pub fn stakers(&self, pool: PoolIndex) -> Result<Vec<StakerView>> {
        let acc = self
            .registry
            .projected_acc(pool, &self.schedule, self.current_block())?;
        let mut stakers = self
            .ledger
            .stakers(pool)
            .map(|(account, position)| {
                Ok(StakerView {
                    account: *account,
                    deposited: position.amount,
                    pending: position.pending(acc)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        stakers.sort_by(|a, b| a.account.cmp(&b.account));
        Ok(stakers)
    }

    /// Emitted reward not yet paid out, across all pools
    pub fn total_pending(&self) -> Result<Amount> {
        self.schedule.total_pending(self.current_block())
    }

    pub fn pool_length(&self) -> usize {
        self.registry.len()
    }

    pub fn pool_info(&self, pool: PoolIndex) -> Result<PoolInfo> {
        self.registry.get(pool).cloned()
    }

    pub fn total_alloc_point(&self) -> u64 {
        self.registry.total_alloc_point()
    }

    pub fn start_block(&self) -> BlockNumber {
        self.schedule.start_block
    }

    pub fn end_block(&self) -> BlockNumber {
        self.schedule.end_block
    }

    pub fn reward_per_block(&self) -> Amount {
        self.schedule.reward_per_block
    }

    pub fn rewards_amount_before_last_change(&self) -> Amount {
        self.schedule.rewards_before_last_change
    }

    pub fn last_emission_change(&self) -> BlockNumber {
        self.schedule.last_emission_change
    }

    pub fn paid_out(&self) -> Amount {
        self.schedule.paid_out
    }

    pub fn total_funded(&self) -> Amount {
        self.schedule.total_funded
    }

    pub fn dust_swept(&self) -> Amount {
        self.schedule.dust_swept
    }

    pub fn reward_token(&self) -> Option<TokenId> {
        self.reward_vault.as_ref().map(|v| v.token())
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn admin_wallet(&self) -> AccountId {
        self.admin_wallet
    }

    pub fn emission(&self) -> &EmissionSchedule {
        &self.schedule
    }

    pub fn current_block(&self) -> BlockNumber {
        self.clock.current_block()
    }

    pub fn phase(&self) -> FarmPhase {
        self.schedule.phase(self.current_block())
    }

    pub fn snapshot(&self) -> Result<FarmSnapshot> {
        Ok(FarmSnapshot {
            current_block: self.current_block(),
            phase: self.phase(),
            owner: self.owner,
            admin_wallet: self.admin_wallet,
            reward_token: self.reward_token(),
            emission: self.schedule.clone(),
            pools: self.registry.pools().to_vec(),
            total_alloc_point: self.registry.total_alloc_point(),
            total_pending: self.total_pending()?,
        })
    }

    // === Internals ===

    fn only_owner(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.owner {
            return Err(FarmError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn reward_vault(&self) -> Result<Arc<dyn TokenVault>> {
        self.reward_vault.clone().ok_or(FarmError::NotInitialized)
    }

    /// Queue the reward payout for `pending`, split by the claim fee
    fn plan_reward(
        &self,
        plan: &mut TransferPlan,
        to: AccountId,
        pending: Amount,
        claim_fee: u32,
    ) -> Result<Receipt> {
        if pending == 0 {
            return Ok(Receipt::default());
        }
        let vault = self.reward_vault()?;
        let (net, fee) = math::split_fee(pending, claim_fee)?;
        plan.push(&vault, to, net);
        plan.push(&vault, self.admin_wallet, fee);
        Ok(Receipt {
            reward: net,
            claim_fee: fee,
            ..Receipt::default()
        })
    }

    fn checkpoint(&self, position: Option<PositionKey>) -> Checkpoint {
        Checkpoint {
            schedule: self.schedule.clone(),
            pools: self.registry.checkpoint(),
            position: position.map(|key| self.ledger.checkpoint(key)),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.schedule = checkpoint.schedule;
        let (pools, total) = checkpoint.pools;
        self.registry.restore(pools, total);
        if let Some(saved) = checkpoint.position {
            self.ledger.restore(saved);
        }
    }

    /// Run `op`, rolling the farm back if it fails
    fn transact<T>(
        &mut self,
        position: Option<PositionKey>,
        op: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let checkpoint = self.checkpoint(position);
        match op(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                debug!(error = %err, "operation rolled back");
                self.restore(checkpoint);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvest_core::{ManualClock, MemoryToken};

    const START: BlockNumber = 100;

    struct Fixture {
        clock: ManualClock,
        farm: Farm,
        reward: MemoryToken,
        lp: MemoryToken,
        owner: AccountId,
        admin: AccountId,
        alice: AccountId,
        bob: AccountId,
    }

    fn custody() -> AccountId {
        AccountId::from_label("farm")
    }

    fn fixture() -> Fixture {
        let clock = ManualClock::new(0);
        let owner = AccountId::from_label("owner");
        let admin = AccountId::from_label("admin");
        let alice = AccountId::from_label("alice");
        let bob = AccountId::from_label("bob");

        let reward = MemoryToken::new("MOCK");
        reward.mint(&owner, 1_000_000);
        let lp = MemoryToken::new("LP");
        lp.mint(&alice, 5_000);
        lp.mint(&bob, 500);

        let mut farm = Farm::new(
            owner,
            Arc::new(clock.clone()),
            FarmParams::new(Arc::new(reward.vault(custody())), 100, START, admin),
        )
        .unwrap();
        farm.add_pool(&owner, Arc::new(lp.vault(custody())), 15, 0, 0)
            .unwrap();
        farm.fund(&owner, 10_000).unwrap();

        Fixture {
            clock,
            farm,
            reward,
            lp,
            owner,
            admin,
            alice,
            bob,
        }
    }

    #[test]
    fn test_uninitialized_farm_rejects_operations() {
        let owner = AccountId::from_label("owner");
        let mut farm = Farm::new(owner, Arc::new(ManualClock::new(0)), FarmParams::empty()).unwrap();
        let lp = MemoryToken::new("LP");

        assert_eq!(farm.phase(), FarmPhase::Uninitialized);
        assert_eq!(farm.fund(&owner, 100), Err(FarmError::NotInitialized));
        assert_eq!(
            farm.add_pool(&owner, Arc::new(lp.vault(custody())), 1, 0, 0),
            Err(FarmError::NotInitialized)
        );
        assert_eq!(farm.deposit(&owner, 0, 1), Err(FarmError::NotInitialized));
        assert_eq!(
            farm.change_reward_per_block(&owner, 10),
            Err(FarmError::NotInitialized)
        );
    }

    #[test]
    fn test_initialize_once() {
        let owner = AccountId::from_label("owner");
        let admin = AccountId::from_label("admin");
        let reward = MemoryToken::new("MOCK");
        let mut farm = Farm::new(owner, Arc::new(ManualClock::new(0)), FarmParams::empty()).unwrap();

        let vault: Arc<dyn TokenVault> = Arc::new(reward.vault(custody()));
        assert_eq!(
            farm.initialize_farm(&admin, vault.clone(), 10, START, admin),
            Err(FarmError::Unauthorized { caller: admin })
        );

        farm.initialize_farm(&owner, vault.clone(), 10, START, admin)
            .unwrap();
        assert_eq!(farm.start_block(), START);
        assert_eq!(farm.reward_per_block(), 10);
        assert_eq!(farm.reward_token(), Some(reward.id()));
        assert_eq!(farm.phase(), FarmPhase::Initialized);

        assert_eq!(
            farm.initialize_farm(&owner, vault, 10, START, admin),
            Err(FarmError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_admin_operations_require_owner() {
        let mut f = fixture();
        let alice = f.alice;
        let denied = |err: FarmError| err == FarmError::Unauthorized { caller: alice };

        assert!(denied(f.farm.fund(&alice, 100).unwrap_err()));
        assert!(denied(f.farm.change_reward_per_block(&alice, 10).unwrap_err()));
        assert!(denied(f.farm.change_admin_wallet(&alice, alice).unwrap_err()));
        assert!(denied(f.farm.set_pool(&alice, 0, 1, 0, 0).unwrap_err()));
        assert!(denied(f.farm.transfer_ownership(&alice, alice).unwrap_err()));
        let lp2 = MemoryToken::new("LP2");
        assert!(denied(
            f.farm
                .add_pool(&alice, Arc::new(lp2.vault(custody())), 5, 0, 0)
                .unwrap_err()
        ));
        assert_eq!(f.farm.owner(), f.owner);
    }

    #[test]
    fn test_deposit_and_pending() {
        let mut f = fixture();
        f.farm.deposit(&f.alice, 0, 1_500).unwrap();
        f.farm.deposit(&f.bob, 0, 500).unwrap();
        assert_eq!(f.farm.total_pending().unwrap(), 0);

        f.clock.advance_to(START + 10);
        assert_eq!(f.farm.pending(0, &f.alice).unwrap(), 750);
        assert_eq!(f.farm.pending(0, &f.bob).unwrap(), 250);
        assert_eq!(f.farm.total_pending().unwrap(), 1_000);
        assert_eq!(f.farm.pool_info(0).unwrap().total_staked, 2_000);
    }

    #[test]
    fn test_withdraw_pays_reward_and_clears_pending() {
        let mut f = fixture();
        f.farm.deposit(&f.alice, 0, 1_000).unwrap();
        f.clock.advance_to(START + 10);

        let receipt = f.farm.withdraw(&f.alice, 0, 1_000).unwrap();
        assert_eq!(receipt.reward, 1_000);
        assert_eq!(receipt.principal, 1_000);
        assert_eq!(f.reward.balance_of(&f.alice), 1_000);
        assert_eq!(f.lp.balance_of(&f.alice), 5_000);
        assert_eq!(f.farm.pending(0, &f.alice).unwrap(), 0);
        assert_eq!(f.farm.paid_out(), 1_000);
        assert_eq!(f.farm.total_pending().unwrap(), 0);
    }

    #[test]
    fn test_withdraw_more_than_deposit() {
        let mut f = fixture();
        f.farm.deposit(&f.bob, 0, 480).unwrap();
        assert_eq!(
            f.farm.withdraw(&f.bob, 0, 600),
            Err(FarmError::InsufficientDeposit {
                pool: 0,
                requested: 600,
                deposited: 480
            })
        );
        assert_eq!(
            f.farm.withdraw(&f.alice, 0, 10),
            Err(FarmError::InsufficientDeposit {
                pool: 0,
                requested: 10,
                deposited: 0
            })
        );
    }

    #[test]
    fn test_claim_harvests_without_principal() {
        let mut f = fixture();
        f.farm.deposit(&f.alice, 0, 1_000).unwrap();
        f.clock.advance_to(START + 4);

        let receipt = f.farm.claim(&f.alice, 0).unwrap();
        assert_eq!(receipt.reward, 400);
        assert_eq!(receipt.principal, 0);
        assert_eq!(f.farm.deposited(0, &f.alice), 1_000);
        assert_eq!(f.farm.pending(0, &f.alice).unwrap(), 0);
    }

    #[test]
    fn test_fees_go_to_admin_wallet() {
        let mut f = fixture();
        f.farm.set_pool(&f.owner, 0, 15, 50, 60).unwrap();
        f.farm.deposit(&f.alice, 0, 1_000).unwrap();
        f.clock.advance_to(START + 10);

        let receipt = f.farm.withdraw(&f.alice, 0, 1_000).unwrap();
        assert_eq!(receipt.claim_fee, 60);
        assert_eq!(receipt.withdrawal_fee, 50);
        assert_eq!(f.reward.balance_of(&f.alice), 940);
        assert_eq!(f.reward.balance_of(&f.admin), 60);
        assert_eq!(f.lp.balance_of(&f.alice), 4_950);
        assert_eq!(f.lp.balance_of(&f.admin), 50);
    }

    #[test]
    fn test_emergency_withdraw_forfeits_to_remaining_stakers() {
        let mut f = fixture();
        f.farm.deposit(&f.alice, 0, 500).unwrap();
        f.farm.deposit(&f.bob, 0, 500).unwrap();
        f.clock.advance_to(START + 10);

        let receipt = f.farm.emergency_withdraw(&f.bob, 0).unwrap();
        assert_eq!(receipt.forfeited, 500);
        assert_eq!(receipt.principal, 500);
        assert_eq!(f.lp.balance_of(&f.bob), 500);
        assert_eq!(f.reward.balance_of(&f.bob), 0);
        assert_eq!(f.farm.pending(0, &f.bob).unwrap(), 0);
        assert_eq!(f.farm.pending(0, &f.alice).unwrap(), 1_000);
    }

    #[test]
    fn test_emergency_forfeit_split_by_stake() {
        let mut f = fixture();
        let carl = AccountId::from_label("carl");
        f.lp.mint(&f.bob, 2_500);
        f.lp.mint(&carl, 1_000);
        f.farm.deposit(&f.alice, 0, 1_000).unwrap();
        f.farm.deposit(&f.bob, 0, 3_000).unwrap();
        f.farm.deposit(&carl, 0, 1_000).unwrap();

        // settle part of carl's reward into the accumulator
        f.clock.advance_to(START + 10);
        assert_eq!(f.farm.claim(&f.alice, 0).unwrap().reward, 200);

        f.clock.advance_to(START + 20);
        let alice_before = f.farm.pending(0, &f.alice).unwrap();
        let bob_before = f.farm.pending(0, &f.bob).unwrap();
        assert_eq!((alice_before, bob_before), (200, 1_200));

        let receipt = f.farm.emergency_withdraw(&carl, 0).unwrap();
        assert_eq!(receipt.forfeited, 400);
        assert_eq!(f.farm.pool_info(0).unwrap().total_staked, 4_000);

        let alice_gain = f.farm.pending(0, &f.alice).unwrap() - alice_before;
        let bob_gain = f.farm.pending(0, &f.bob).unwrap() - bob_before;
        assert_eq!((alice_gain, bob_gain), (100, 300));
        assert_eq!(alice_gain + bob_gain, receipt.forfeited);

        // later blocks split over the reduced stake only
        f.clock.advance_to(START + 30);
        assert_eq!(f.farm.pending(0, &f.alice).unwrap(), 550);
        assert_eq!(f.farm.pending(0, &f.bob).unwrap(), 2_250);
        assert_eq!(f.farm.pending(0, &carl).unwrap(), 0);
    }

    #[test]
    fn test_failed_transfer_rolls_back() {
        let mut f = fixture();
        f.farm.deposit(&f.alice, 0, 1_000).unwrap();
        f.clock.advance_to(START + 10);

        let before = f.farm.snapshot().unwrap();
        f.lp.set_frozen(&f.alice, true);
        let err = f.farm.withdraw(&f.alice, 0, 1_000).unwrap_err();
        assert_eq!(
            err,
            FarmError::TransferFailed {
                token: f.lp.id(),
                reason: TransferError::Frozen(f.alice)
            }
        );

        // pool not settled, position untouched, nothing paid
        let after = f.farm.snapshot().unwrap();
        assert_eq!(after.pools, before.pools);
        assert_eq!(after.emission, before.emission);
        assert_eq!(f.farm.deposited(0, &f.alice), 1_000);
        assert_eq!(f.farm.pending(0, &f.alice).unwrap(), 1_000);
        assert_eq!(f.reward.balance_of(&f.alice), 0);
    }

    #[test]
    fn test_failed_deposit_pull_leaves_no_position() {
        let mut f = fixture();
        f.clock.advance_to(START + 5);
        let carl = AccountId::from_label("carl");

        let err = f.farm.deposit(&carl, 0, 100).unwrap_err();
        assert!(matches!(err, FarmError::TransferFailed { .. }));
        assert_eq!(f.farm.pool_info(0).unwrap().last_reward_block, START);
        assert!(f.farm.stakers(0).unwrap().is_empty());
    }

    #[test]
    fn test_fund_rejects_indivisible_before_transfer() {
        let mut f = fixture();
        let before = f.reward.balance_of(&f.owner);
        assert_eq!(
            f.farm.fund(&f.owner, 15_555),
            Err(FarmError::IndivisibleFunding {
                amount: 15_555,
                reward_per_block: 100
            })
        );
        assert_eq!(f.reward.balance_of(&f.owner), before);
        assert_eq!(f.farm.total_funded(), 10_000);
    }

    #[test]
    fn test_fund_after_close() {
        let mut f = fixture();
        f.clock.advance_to(START + 200);
        assert_eq!(f.farm.phase(), FarmPhase::Closed);
        assert_eq!(
            f.farm.fund(&f.owner, 10_000),
            Err(FarmError::FarmClosed {
                current: START + 200,
                end: START + 100
            })
        );
    }

    #[test]
    fn test_rate_change_preserves_pending() {
        let mut f = fixture();
        f.farm.deposit(&f.alice, 0, 300).unwrap();
        f.farm.deposit(&f.bob, 0, 400).unwrap();
        f.clock.advance_to(START + 7);

        let alice = f.farm.pending(0, &f.alice).unwrap();
        let bob = f.farm.pending(0, &f.bob).unwrap();
        f.farm.change_reward_per_block(&f.owner, 30).unwrap();

        assert_eq!(f.farm.pending(0, &f.alice).unwrap(), alice);
        assert_eq!(f.farm.pending(0, &f.bob).unwrap(), bob);
        assert_eq!(f.farm.last_emission_change(), START + 7);
        assert_eq!(f.farm.rewards_amount_before_last_change(), 700);
    }

    #[test]
    fn test_rate_change_sweeps_dust_to_admin() {
        let mut f = fixture();
        // 10_000 / 30 leaves 10
        let dust = f.farm.change_reward_per_block(&f.owner, 30).unwrap();
        assert_eq!(dust, 10);
        assert_eq!(f.reward.balance_of(&f.admin), 10);
        assert_eq!(f.farm.end_block(), START + 333);
        assert_eq!(f.farm.dust_swept(), 10);
    }

    #[test]
    fn test_add_pool_after_start_begins_at_current_block() {
        let mut f = fixture();
        f.clock.advance_to(START + 20);
        let lp2 = MemoryToken::new("LP2");
        let index = f
            .farm
            .add_pool(&f.owner, Arc::new(lp2.vault(custody())), 5, 0, 0)
            .unwrap();

        assert_eq!(index, 1);
        assert_eq!(f.farm.pool_info(1).unwrap().last_reward_block, START + 20);
        assert_eq!(f.farm.pool_info(0).unwrap().last_reward_block, START + 20);
        assert_eq!(f.farm.total_alloc_point(), 20);
    }

    #[test]
    fn test_unknown_pool() {
        let mut f = fixture();
        assert_eq!(f.farm.deposit(&f.alice, 3, 10), Err(FarmError::PoolNotFound(3)));
        assert_eq!(f.farm.withdraw(&f.alice, 3, 0), Err(FarmError::PoolNotFound(3)));
        assert_eq!(f.farm.pending(3, &f.alice), Err(FarmError::PoolNotFound(3)));
        assert_eq!(f.farm.set_pool(&f.owner, 3, 1, 0, 0), Err(FarmError::PoolNotFound(3)));
    }

    #[test]
    fn test_ownership_transfer() {
        let mut f = fixture();
        f.farm.transfer_ownership(&f.owner, f.alice).unwrap();
        assert_eq!(f.farm.owner(), f.alice);
        assert!(f.farm.change_admin_wallet(&f.owner, f.owner).is_err());
        f.farm.change_admin_wallet(&f.alice, f.bob).unwrap();
        assert_eq!(f.farm.admin_wallet(), f.bob);
    }

    #[test]
    fn test_snapshot_serializes() {
        let f = fixture();
        let snapshot = f.farm.snapshot().unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"phase\":\"initialized\""));
        assert_eq!(snapshot.pools.len(), 1);
    }
}
