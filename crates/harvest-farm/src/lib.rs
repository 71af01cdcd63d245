//! # Harvest Farm
//!
//! Multi-pool, block-indexed reward farm. Stakers deposit a pool's token and
//! accrue a share of a funded reward stream proportional to their stake and
//! the pool's allocation weight.
//!
//! ```text
//!              ┌──────────────────────── Farm ────────────────────────┐
//!  deposit ──► │ EmissionSchedule ─► PoolRegistry ─► UserLedger       │ ──► TokenVault
//!  withdraw    │  (rate, window)     (accumulators)  (amount, debt)   │
//!  fund ...    └──────────────────────────────────────────────────────┘
//! ```
//!
//! - [`emission`]: reward rate, funded budget and the start/end window
//! - [`pool`]: pools with their reward-per-share accumulators
//! - [`ledger`]: per (pool, account) positions
//! - [`farm`]: the orchestrator and its atomic operations
//! - [`shared`]: a lock-protected handle for multi-threaded callers
//! - [`config`]: TOML deployment configuration

pub mod config;
pub mod emission;
pub mod farm;
pub mod ledger;
pub mod pool;
pub mod shared;

pub use config::{ConfigError, FarmConfig, FarmSettings, PoolConfig, RewardTokenConfig};
pub use emission::{EmissionSchedule, FarmPhase};
pub use farm::{Farm, FarmParams, FarmSnapshot, Receipt, StakerView};
pub use ledger::{Position, UserLedger};
pub use pool::{PoolInfo, PoolRegistry};
pub use shared::SharedFarm;
