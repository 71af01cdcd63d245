//! Farm deployment configuration
//!
//! Amounts are written in whole tokens and scaled by the token's decimals
//! when converted, so TOML integers stay within range.

use harvest_core::math::MAX_FEE;
use harvest_core::{Amount, BlockNumber};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete farm configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Reward token
    #[serde(default)]
    pub reward: RewardTokenConfig,

    /// Emission settings
    #[serde(default)]
    pub farm: FarmSettings,

    /// Pools added after funding, in order
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// Reward token settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RewardTokenConfig {
    #[serde(default = "default_reward_name")]
    pub name: String,

    #[serde(default = "default_reward_symbol")]
    pub symbol: String,

    #[serde(default = "default_decimals")]
    pub decimals: u32,

    /// Supply minted to the owner, whole tokens
    #[serde(default = "default_supply")]
    pub supply: u64,
}

fn default_reward_name() -> String {
    "GAX Mock Token".to_string()
}

fn default_reward_symbol() -> String {
    "tGAX".to_string()
}

fn default_decimals() -> u32 {
    18
}

fn default_supply() -> u64 {
    1_000_000_000
}

impl Default for RewardTokenConfig {
    fn default() -> Self {
        Self {
            name: default_reward_name(),
            symbol: default_reward_symbol(),
            decimals: default_decimals(),
            supply: default_supply(),
        }
    }
}

/// Emission and role settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FarmSettings {
    /// Whole reward tokens emitted per block
    #[serde(default = "default_reward_per_block")]
    pub reward_per_block: u64,

    /// Absolute start block; overrides `delay`
    #[serde(default)]
    pub start_block: Option<BlockNumber>,

    /// Blocks between deployment and the start block
    #[serde(default = "default_delay")]
    pub delay: BlockNumber,

    /// Whole reward tokens funded at deployment (0 skips funding)
    #[serde(default)]
    pub fund: u64,

    /// Owner account label
    #[serde(default = "default_owner")]
    pub owner: String,

    /// Admin wallet label, receives fees and dust
    #[serde(default = "default_admin_wallet")]
    pub admin_wallet: String,

    /// Accounts receiving each pool's `mint_per_account`
    #[serde(default = "default_accounts")]
    pub accounts: Vec<String>,
}

fn default_reward_per_block() -> u64 {
    100
}

fn default_delay() -> BlockNumber {
    100
}

fn default_owner() -> String {
    "owner".to_string()
}

fn default_admin_wallet() -> String {
    "admin".to_string()
}

fn default_accounts() -> Vec<String> {
    vec!["alice".to_string(), "bob".to_string(), "carl".to_string()]
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            reward_per_block: default_reward_per_block(),
            start_block: None,
            delay: default_delay(),
            fund: 0,
            owner: default_owner(),
            admin_wallet: default_admin_wallet(),
            accounts: default_accounts(),
        }
    }
}

/// Staking pool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub symbol: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_decimals")]
    pub decimals: u32,

    #[serde(default = "default_alloc_point")]
    pub alloc_point: u64,

    /// Per-mille
    #[serde(default)]
    pub withdrawal_fee: u32,

    /// Per-mille
    #[serde(default)]
    pub claim_fee: u32,

    /// Percent burned by every transfer of the deposit token
    #[serde(default)]
    pub transfer_tax: u8,

    /// Whole tokens minted to every configured account
    #[serde(default = "default_mint_per_account")]
    pub mint_per_account: u64,
}

fn default_alloc_point() -> u64 {
    1
}

fn default_mint_per_account() -> u64 {
    1_000
}

impl FarmConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.farm.reward_per_block == 0 {
            return Err(ConfigError::Invalid("reward_per_block must be positive".into()));
        }
        if self.farm.fund % self.farm.reward_per_block != 0 {
            return Err(ConfigError::Invalid(format!(
                "fund {} is not a multiple of reward_per_block {}",
                self.farm.fund, self.farm.reward_per_block
            )));
        }
        self.reward_unit()?;

        for (index, pool) in self.pools.iter().enumerate() {
            if self.pools[..index].iter().any(|p| p.symbol == pool.symbol) {
                return Err(ConfigError::Invalid(format!("duplicate pool {}", pool.symbol)));
            }
            for fee in [pool.withdrawal_fee, pool.claim_fee] {
                if fee > MAX_FEE {
                    return Err(ConfigError::Invalid(format!(
                        "pool {}: fee {} exceeds {}",
                        pool.symbol, fee, MAX_FEE
                    )));
                }
            }
            if pool.transfer_tax > 100 {
                return Err(ConfigError::Invalid(format!(
                    "pool {}: transfer tax {}% exceeds 100%",
                    pool.symbol, pool.transfer_tax
                )));
            }
            pool.unit()?;
        }
        Ok(())
    }

    /// Start block for a deployment at `current`
    pub fn start_block(&self, current: BlockNumber) -> BlockNumber {
        self.farm
            .start_block
            .unwrap_or_else(|| current + self.farm.delay)
    }

    /// Smallest units per whole reward token
    pub fn reward_unit(&self) -> Result<Amount, ConfigError> {
        unit(self.reward.decimals)
    }

    pub fn reward_per_block(&self) -> Result<Amount, ConfigError> {
        scale(self.farm.reward_per_block, self.reward.decimals)
    }

    pub fn fund_amount(&self) -> Result<Amount, ConfigError> {
        scale(self.farm.fund, self.reward.decimals)
    }

    pub fn reward_supply(&self) -> Result<Amount, ConfigError> {
        scale(self.reward.supply, self.reward.decimals)
    }
}

impl PoolConfig {
    pub fn unit(&self) -> Result<Amount, ConfigError> {
        unit(self.decimals)
    }

    pub fn mint_amount(&self) -> Result<Amount, ConfigError> {
        scale(self.mint_per_account, self.decimals)
    }
}

fn unit(decimals: u32) -> Result<Amount, ConfigError> {
    10u128
        .checked_pow(decimals)
        .ok_or_else(|| ConfigError::Invalid(format!("{} decimals is out of range", decimals)))
}

/// Whole tokens to smallest units
pub fn scale(whole: u64, decimals: u32) -> Result<Amount, ConfigError> {
    (whole as u128)
        .checked_mul(unit(decimals)?)
        .ok_or_else(|| ConfigError::Invalid(format!("{} tokens overflow at {} decimals", whole, decimals)))
}
