//! Block clock
//!
//! The farm reads time from a monotonic block counter it does not control.
//! Time only advances between calls.

use crate::types::BlockNumber;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of the current block height
pub trait BlockSource: Send + Sync {
    fn current_block(&self) -> BlockNumber;
}

/// Manually driven block counter for tests and simulations.
///
/// Clones share the same counter.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    block: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(block: BlockNumber) -> Self {
        Self {
            block: Arc::new(AtomicU64::new(block)),
        }
    }

    /// Advance by `blocks`, returning the new height
    pub fn advance(&self, blocks: u64) -> BlockNumber {
        self.block.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    /// Jump forward to `block`. Never moves backwards.
    pub fn advance_to(&self, block: BlockNumber) -> BlockNumber {
        self.block.fetch_max(block, Ordering::SeqCst).max(block)
    }
}

impl BlockSource for ManualClock {
    fn current_block(&self) -> BlockNumber {
        self.block.load(Ordering::SeqCst)
    }
}
