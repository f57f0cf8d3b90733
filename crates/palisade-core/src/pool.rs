//! Pool ledger: process-wide emission state.

use serde::{Deserialize, Serialize};

use crate::hash::CanonicalHasher;
use crate::math::{add_u128, advance_pool_index};
use crate::types::PoolParams;
use crate::Result;

/// Global emission state. One instance per pool.
///
/// `index` is the cumulative reward per allocation point since inception,
/// scaled by [`crate::UNIT`]; it never decreases. `rewards_emitted` tracks the
/// envelope consumption and never exceeds `total_rewards`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub end_time: u64,
    pub emission_per_second: u128,
    pub total_alloc_points: u128,
    pub index: u128,
    pub last_update_timestamp: u64,
    pub total_rewards: u128,
    pub rewards_emitted: u128,
    pub paused: bool,
    pub frozen: bool,
}

impl PoolState {
    pub fn from_params(params: &PoolParams) -> PoolState {
        PoolState {
            end_time: params.end_time(),
            emission_per_second: params.emission_per_second(),
            total_alloc_points: 0,
            index: 0,
            last_update_timestamp: params.start_time(),
            total_rewards: params.total_rewards(),
            rewards_emitted: 0,
            paused: false,
            frozen: false,
        }
    }

    /// Bring the pool index up to `now`.
    ///
    /// Returns the effective timestamp, `min(now, end_time)`, which callers
    /// use for vault-maturity detection. A same-timestamp call is a no-op and
    /// still returns the effective timestamp.
    pub fn update(&mut self, now: u64) -> Result<u64> {
        if now == self.last_update_timestamp {
            return Ok(now.min(self.end_time));
        }
        let (next_index, _, emitted) = advance_pool_index(
            self.index,
            self.emission_per_second,
            self.last_update_timestamp,
            self.total_alloc_points,
            now,
            self.end_time,
        )?;
        self.index = next_index;
        self.rewards_emitted = add_u128(self.rewards_emitted, emitted)?;
        self.last_update_timestamp = now;
        Ok(now.min(self.end_time))
    }

    pub(crate) fn encode(&self, h: &mut CanonicalHasher) {
        h.u64(self.end_time);
        h.u128(self.emission_per_second);
        h.u128(self.total_alloc_points);
        h.u128(self.index);
        h.u64(self.last_update_timestamp);
        h.u128(self.total_rewards);
        h.u128(self.rewards_emitted);
        h.bool(self.paused);
        h.bool(self.frozen);
    }
}
