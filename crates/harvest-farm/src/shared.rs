//! Thread-safe farm handle
//!
//! All mutations are serialized through one write lock so every operation
//! observes and leaves a settled, consistent ledger. Queries share the read
//! lock and recompute settlement projections on the fly.

use crate::farm::{Farm, FarmSnapshot, Receipt};
use harvest_core::{AccountId, Amount, BlockNumber, PoolIndex, Result, TokenVault};
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;

/// Cloneable handle to a farm shared between threads
#[derive(Clone, Debug)]
pub struct SharedFarm {
    inner: Arc<RwLock<Farm>>,
}

impl SharedFarm {
    pub fn new(farm: Farm) -> Self {
        Self {
            inner: Arc::new(RwLock::new(farm)),
        }
    }

    /// Read access for queries
    pub fn read(&self) -> RwLockReadGuard<'_, Farm> {
        self.inner.read()
    }

    /// Run `op` under the write lock
    pub fn with_mut<T>(&self, op: impl FnOnce(&mut Farm) -> T) -> T {
        op(&mut self.inner.write())
    }

    pub fn deposit(&self, caller: &AccountId, pool: PoolIndex, amount: Amount) -> Result<Receipt> {
        self.inner.write().deposit(caller, pool, amount)
    }

    pub fn withdraw(&self, caller: &AccountId, pool: PoolIndex, amount: Amount) -> Result<Receipt> {
        self.inner.write().withdraw(caller, pool, amount)
    }

    pub fn claim(&self, caller: &AccountId, pool: PoolIndex) -> Result<Receipt> {
        self.inner.write().claim(caller, pool)
    }

    pub fn emergency_withdraw(&self, caller: &AccountId, pool: PoolIndex) -> Result<Receipt> {
        self.inner.write().emergency_withdraw(caller, pool)
    }

    pub fn add_pool(
        &self,
        caller: &AccountId,
        vault: Arc<dyn TokenVault>,
        alloc_point: u64,
        withdrawal_fee: u32,
        claim_fee: u32,
    ) -> Result<PoolIndex> {
        self.inner
            .write()
            .add_pool(caller, vault, alloc_point, withdrawal_fee, claim_fee)
    }

    pub fn set_pool(
        &self,
        caller: &AccountId,
        pool: PoolIndex,
        alloc_point: u64,
        withdrawal_fee: u32,
        claim_fee: u32,
    ) -> Result<()> {
        self.inner
            .write()
            .set_pool(caller, pool, alloc_point, withdrawal_fee, claim_fee)
    }

    pub fn change_admin_wallet(&self, caller: &AccountId, admin_wallet: AccountId) -> Result<()> {
        self.inner.write().change_admin_wallet(caller, admin_wallet)
    }

    pub fn transfer_ownership(&self, caller: &AccountId, owner: AccountId) -> Result<()> {
        self.inner.write().transfer_ownership(caller, owner)
    }

    pub fn mass_update_pools(&self) -> Result<()> {
        self.inner.write().mass_update_pools()
    }

    pub fn update_pool(&self, pool: PoolIndex) -> Result<bool> {
        self.inner.write().update_pool(pool)
    }

    pub fn fund(&self, caller: &AccountId, amount: Amount) -> Result<BlockNumber> {
        self.inner.write().fund(caller, amount)
    }

    pub fn change_reward_per_block(&self, caller: &AccountId, reward_per_block: Amount) -> Result<Amount> {
        self.inner.write().change_reward_per_block(caller, reward_per_block)
    }

    pub fn pending(&self, pool: PoolIndex, account: &AccountId) -> Result<Amount> {
        self.inner.read().pending(pool, account)
    }

    pub fn total_pending(&self) -> Result<Amount> {
        self.inner.read().total_pending()
    }

    pub fn snapshot(&self) -> Result<FarmSnapshot> {
        self.inner.read().snapshot()
    }
}
