//! Runtime safety bounds.
//!
//! These cap state size and worst-case work per operation. They are not
//! economic parameters: tightening them never changes an accounting result,
//! only which operations are admitted.

use serde::{Deserialize, Serialize};

use crate::{PoolError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeBounds {
    /// Maximum number of vaults the pool will track.
    pub max_vaults: usize,
    /// Maximum number of positions per vault.
    pub max_positions_per_vault: usize,
    /// Maximum vault ids accepted by one `update_vaults` batch.
    pub max_update_batch: usize,
    /// Maximum salt retries when deriving a fresh vault id.
    pub max_id_retries: u64,
}

impl RuntimeBounds {
    pub fn validate(&self) -> Result<()> {
        if self.max_vaults == 0
            || self.max_positions_per_vault == 0
            || self.max_update_batch == 0
            || self.max_id_retries == 0
        {
            return Err(PoolError::BoundsExceeded);
        }
        Ok(())
    }
}

impl Default for RuntimeBounds {
    fn default() -> Self {
        RuntimeBounds {
            max_vaults: 4_096,
            max_positions_per_vault: 65_536,
            max_update_batch: 256,
            max_id_retries: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_bounds_are_valid() {
        assert!(RuntimeBounds::default().validate().is_ok());
    }

    #[test]
    fn zero_bound_is_rejected() {
        let mut b = RuntimeBounds::default();
        b.max_update_batch = 0;
        assert_eq!(b.validate().unwrap_err(), PoolError::BoundsExceeded);
    }
}
