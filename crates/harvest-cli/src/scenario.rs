//! Scenario replay
//!
//! Deploys a farm from a [`FarmConfig`] against in-memory tokens and replays
//! a timeline of block-stamped actions. Amounts in a scenario are whole
//! tokens of the token the action moves.

use anyhow::{bail, Context, Result};
use harvest_core::{AccountId, Amount, BlockNumber, ManualClock, MemoryToken, PoolIndex};
use harvest_farm::config::scale;
use harvest_farm::{Farm, FarmConfig, FarmParams, FarmSnapshot, PoolConfig, Receipt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Ordered list of actions
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// An action executed at a block
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Step {
    pub block: BlockNumber,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Deposit { account: String, pool: PoolIndex, amount: u64 },
    Withdraw { account: String, pool: PoolIndex, amount: u64 },
    /// Withdraw the whole recorded deposit (post transfer tax)
    WithdrawAll { account: String, pool: PoolIndex },
    Claim { account: String, pool: PoolIndex },
    EmergencyWithdraw { account: String, pool: PoolIndex },
    Fund { amount: u64 },
    ChangeRate { reward_per_block: u64 },
    AddPool(PoolConfig),
    SetPool {
        pool: PoolIndex,
        alloc_point: u64,
        #[serde(default)]
        withdrawal_fee: u32,
        #[serde(default)]
        claim_fee: u32,
    },
    ChangeAdmin { wallet: String },
}

impl Scenario {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(s).context("invalid scenario")?;
        if let Some(pair) = scenario.steps.windows(2).find(|w| w[1].block < w[0].block) {
            bail!(
                "scenario steps go back in time: block {} after block {}",
                pair[1].block,
                pair[0].block
            );
        }
        Ok(scenario)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// Result of one replayed step
#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub block: BlockNumber,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_block: Option<BlockNumber>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Balances and positions of one account
#[derive(Clone, Debug, Serialize)]
pub struct AccountReport {
    pub label: String,
    pub id: String,
    pub reward_balance: Amount,
    pub positions: Vec<PositionReport>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PositionReport {
    pub pool: PoolIndex,
    pub symbol: String,
    pub token_balance: Amount,
    pub deposited: Amount,
    pub pending: Amount,
}

/// Final state of a simulation
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub farm: FarmSnapshot,
    pub reward_custody: Amount,
    pub accounts: Vec<AccountReport>,
    pub steps: Vec<StepOutcome>,
}

struct PoolToken {
    token: MemoryToken,
    decimals: u32,
}

/// A deployed farm with its in-memory collaborators
pub struct Simulation {
    clock: ManualClock,
    farm: Farm,
    reward: MemoryToken,
    reward_decimals: u32,
    pools: Vec<PoolToken>,
    custody: AccountId,
    owner: AccountId,
    accounts: BTreeMap<String, AccountId>,
    outcomes: Vec<StepOutcome>,
}

impl Simulation {
    /// Deploy at block 0: mint the reward supply to the owner, create the
    /// farm, fund it and add the configured pools.
    pub fn deploy(config: &FarmConfig) -> Result<Self> {
        config.validate()?;
        let clock = ManualClock::new(0);
        let custody = AccountId::from_label("farm");
        let owner = AccountId::from_label(&config.farm.owner);
        let admin = AccountId::from_label(&config.farm.admin_wallet);

        let reward = MemoryToken::new(&config.reward.symbol);
        reward.mint(&owner, config.reward_supply()?);

        let start_block = config.start_block(0);
        let farm = Farm::new(
            owner,
            Arc::new(clock.clone()),
            FarmParams::new(
                Arc::new(reward.vault(custody)),
                config.reward_per_block()?,
                start_block,
                admin,
            ),
        )?;
        tracing::info!(
            reward = %config.reward.symbol,
            start_block,
            reward_per_block = config.farm.reward_per_block,
            "farm deployed"
        );

        let mut sim = Self {
            clock,
            farm,
            reward,
            reward_decimals: config.reward.decimals,
            pools: Vec::new(),
            custody,
            owner,
            accounts: BTreeMap::new(),
            outcomes: Vec::new(),
        };
        for label in [&config.farm.owner, &config.farm.admin_wallet] {
            sim.account(label);
        }
        for label in &config.farm.accounts {
            sim.account(label);
        }

        if config.farm.fund > 0 {
            sim.farm.fund(&owner, config.fund_amount()?)?;
        }
        for pool in &config.pools {
            sim.add_pool(pool, &config.farm.accounts)?;
        }
        Ok(sim)
    }

    pub fn farm(&self) -> &Farm {
        &self.farm
    }

    /// Account for a label, registered for the report
    pub fn account(&mut self, label: &str) -> AccountId {
        *self
            .accounts
            .entry(label.to_string())
            .or_insert_with(|| AccountId::from_label(label))
    }

    fn add_pool(&mut self, pool: &PoolConfig, accounts: &[String]) -> Result<PoolIndex> {
        let token = MemoryToken::with_tax(&pool.symbol, pool.transfer_tax);
        let mint = pool.mint_amount()?;
        for label in accounts {
            let account = self.account(label);
            token.mint(&account, mint);
        }

        let index = self.farm.add_pool(
            &self.owner,
            Arc::new(token.vault(self.custody)),
            pool.alloc_point,
            pool.withdrawal_fee,
            pool.claim_fee,
        )?;
        self.pools.push(PoolToken {
            token,
            decimals: pool.decimals,
        });
        Ok(index)
    }

    fn pool_amount(&self, pool: PoolIndex, whole: u64) -> Result<Amount> {
        let decimals = match self.pools.get(pool) {
            Some(p) => p.decimals,
            None => bail!("pool {} does not exist", pool),
        };
        Ok(scale(whole, decimals)?)
    }

    fn reward_amount(&self, whole: u64) -> Result<Amount> {
        Ok(scale(whole, self.reward_decimals)?)
    }

    /// Replay every step. Farm errors are recorded in the outcome and the
    /// replay continues; malformed steps abort it.
    pub fn run(&mut self, scenario: &Scenario) -> Result<()> {
        for step in &scenario.steps {
            if step.block < self.farm.current_block() {
                bail!(
                    "step at block {} is before the current block {}",
                    step.block,
                    self.farm.current_block()
                );
            }
            self.clock.advance_to(step.block);
            let outcome = self.apply(step)?;
            if let Some(error) = &outcome.error {
                tracing::warn!(block = step.block, action = %outcome.action, %error, "step failed");
            }
            self.outcomes.push(outcome);
        }
        Ok(())
    }

    fn apply(&mut self, step: &Step) -> Result<StepOutcome> {
        let mut outcome = StepOutcome {
            block: step.block,
            action: String::new(),
            receipt: None,
            end_block: None,
            error: None,
        };
        let owner = self.owner;

        let result = match &step.action {
            Action::Deposit { account, pool, amount } => {
                outcome.action = format!("{} deposits {} into pool {}", account, amount, pool);
                let who = self.account(account);
                let amount = self.pool_amount(*pool, *amount)?;
                self.farm.deposit(&who, *pool, amount).map(|r| outcome.receipt = Some(r))
            }
            Action::Withdraw { account, pool, amount } => {
                outcome.action = format!("{} withdraws {} from pool {}", account, amount, pool);
                let who = self.account(account);
                let amount = self.pool_amount(*pool, *amount)?;
                self.farm.withdraw(&who, *pool, amount).map(|r| outcome.receipt = Some(r))
            }
            Action::WithdrawAll { account, pool } => {
                outcome.action = format!("{} withdraws everything from pool {}", account, pool);
                let who = self.account(account);
                let amount = self.farm.deposited(*pool, &who);
                self.farm.withdraw(&who, *pool, amount).map(|r| outcome.receipt = Some(r))
            }
            Action::Claim { account, pool } => {
                outcome.action = format!("{} claims pool {}", account, pool);
                let who = self.account(account);
                self.farm.claim(&who, *pool).map(|r| outcome.receipt = Some(r))
            }
            Action::EmergencyWithdraw { account, pool } => {
                outcome.action = format!("{} emergency-withdraws pool {}", account, pool);
                let who = self.account(account);
                self.farm
                    .emergency_withdraw(&who, *pool)
                    .map(|r| outcome.receipt = Some(r))
            }
            Action::Fund { amount } => {
                outcome.action = format!("owner funds {}", amount);
                let amount = self.reward_amount(*amount)?;
                self.farm
                    .fund(&owner, amount)
                    .map(|end| outcome.end_block = Some(end))
            }
            Action::ChangeRate { reward_per_block } => {
                outcome.action = format!("owner changes reward per block to {}", reward_per_block);
                let rate = self.reward_amount(*reward_per_block)?;
                self.farm
                    .change_reward_per_block(&owner, rate)
                    .map(|_| outcome.end_block = Some(self.farm.end_block()))
            }
            Action::AddPool(pool) => {
                outcome.action = format!("owner adds pool {}", pool.symbol);
                let accounts: Vec<String> = self.accounts.keys().cloned().collect();
                match self.add_pool(pool, &accounts) {
                    Ok(_) => Ok(()),
                    Err(err) => match err.downcast::<harvest_core::FarmError>() {
                        Ok(farm_err) => Err(farm_err),
                        Err(other) => return Err(other),
                    },
                }
            }
            Action::SetPool {
                pool,
                alloc_point,
                withdrawal_fee,
                claim_fee,
            } => {
                outcome.action = format!("owner sets pool {} weight to {}", pool, alloc_point);
                self.farm
                    .set_pool(&owner, *pool, *alloc_point, *withdrawal_fee, *claim_fee)
            }
            Action::ChangeAdmin { wallet } => {
                outcome.action = format!("owner changes admin wallet to {}", wallet);
                let wallet = self.account(wallet);
                self.farm.change_admin_wallet(&owner, wallet)
            }
        };

        if let Err(err) = result {
            outcome.error = Some(err.to_string());
        }
        Ok(outcome)
    }

    /// Snapshot of the farm, every known account and the replayed steps
    pub fn report(&self) -> Result<Report> {
        let mut accounts = Vec::with_capacity(self.accounts.len());
        for (label, account) in &self.accounts {
            let mut positions = Vec::new();
            for (pool, pool_token) in self.pools.iter().enumerate() {
                positions.push(PositionReport {
                    pool,
                    symbol: pool_token.token.symbol().to_string(),
                    token_balance: pool_token.token.balance_of(account),
                    deposited: self.farm.deposited(pool, account),
                    pending: self.farm.pending(pool, account)?,
                });
            }
            accounts.push(AccountReport {
                label: label.clone(),
                id: account.to_hex(),
                reward_balance: self.reward.balance_of(account),
                positions,
            });
        }

        Ok(Report {
            farm: self.farm.snapshot()?,
            reward_custody: self.reward.balance_of(&self.custody),
            accounts,
            steps: self.outcomes.clone(),
        })
    }
}
