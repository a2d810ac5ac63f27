//! Construction-time settings shared by all index structures

use crate::error::{Error, Result};

/// Sizing knobs for an index structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Number of entries to pre-allocate room for
    pub initial_capacity: usize,

    /// Shard count of the concurrent index used by strong-mode structures.
    /// Must be a power of two greater than one.
    pub shard_amount: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism().map_or(1, usize::from);
        Self {
            initial_capacity: 0,
            shard_amount: (parallelism * 4).next_power_of_two().max(2),
        }
    }
}

impl IndexConfig {
    /// Set the number of entries to pre-allocate room for
    pub fn with_initial_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    /// Set the shard count of the strong-mode concurrent index
    pub fn with_shard_amount(mut self, shard_amount: usize) -> Self {
        self.shard_amount = shard_amount;
        self
    }

    /// Check the settings before they reach a constructor
    pub fn validate(&self) -> Result<()> {
        if self.shard_amount < 2 || !self.shard_amount.is_power_of_two() {
            return Err(Error::InvalidArgument(
                "shard_amount must be a power of two greater than one",
            ));
        }
        Ok(())
    }
}
