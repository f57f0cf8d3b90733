//! Vault ledger: per-vault stake, fee partition and reward indexes.

use serde::{Deserialize, Serialize};

use crate::hash::CanonicalHasher;
use crate::math::{add_u128, mul_div_floor, rewards_from_index, sub_u128};
use crate::pool::PoolState;
use crate::types::{AccountId, DurationClass, Factor, VaultId, BASE_LIMIT, UNIT};
use crate::Result;

/// Per-vault accounting state.
///
/// The fee partition is strictly non-overlapping: every reward that accrues to
/// the vault lands in exactly one of the creator pot, the boost pot, or the
/// principal pot (`rewards_per_token`). `acc_total_rewards` is the sum of the
/// three, up to floor-division dust.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    pub vault_id: VaultId,
    pub creator: AccountId,
    pub duration: DurationClass,
    pub end_time: u64,
    /// Allocation multiplier in 1/100 units; base value from the duration
    /// class, raised by each staked boost.
    pub multiplier: u128,
    pub staked_principal: u128,
    pub staked_boosts: u32,
    /// `staked_principal · multiplier` while live; zero before the first
    /// principal stake and after the maturity final-update.
    pub alloc_points: u128,
    pub principal_limit: u128,
    pub creator_fee_factor: Factor,
    pub boost_fee_factor: Factor,
    /// Snapshot of the pool index at the last vault update.
    pub vault_index: u128,
    /// Cumulative reward per staked boost; advances only while boosts are
    /// present.
    pub boost_index: u128,
    /// Cumulative principal reward per staked unit, net of fees, scaled by
    /// [`UNIT`].
    pub rewards_per_token: u128,
    pub acc_total_rewards: u128,
    pub acc_creator_rewards: u128,
    pub acc_boost_rewards: u128,
    pub total_claimed: u128,
}

impl VaultState {
    pub fn create(
        vault_id: VaultId,
        creator: AccountId,
        duration: DurationClass,
        created_at: u64,
        creator_fee_factor: Factor,
        boost_fee_factor: Factor,
        pool_index: u128,
    ) -> VaultState {
        VaultState {
            vault_id,
            creator,
            duration,
            end_time: created_at.saturating_add(duration.seconds()),
            multiplier: duration.multiplier(),
            staked_principal: 0,
            staked_boosts: 0,
            alloc_points: 0,
            principal_limit: BASE_LIMIT,
            creator_fee_factor,
            boost_fee_factor,
            vault_index: pool_index,
            boost_index: 0,
            rewards_per_token: 0,
            acc_total_rewards: 0,
            acc_creator_rewards: 0,
            acc_boost_rewards: 0,
            total_claimed: 0,
        }
    }

    pub fn matured(&self, now: u64) -> bool {
        now >= self.end_time
    }

    /// Bring this vault up to the current pool index, booking fee and
    /// principal accruals, then apply the one-time maturity final-update.
    ///
    /// A vault with zero alloc-points books nothing: its `vault_index` snaps
    /// forward so the skipped interval can never be claimed later. Rewards
    /// that would have corresponded to a never-staked vault are dropped.
    pub fn sync(&mut self, pool: &mut PoolState, now: u64) -> Result<()> {
        let effective_ts = pool.update(now)?;

        if pool.index != self.vault_index {
            if self.alloc_points == 0 {
                self.vault_index = pool.index;
            } else {
                self.accrue(pool.index)?;
            }
        }

        // Maturity final-update: runs exactly once, afterwards the vault no
        // longer competes for emission.
        if self.alloc_points > 0 && effective_ts >= self.end_time {
            pool.total_alloc_points = sub_u128(pool.total_alloc_points, self.alloc_points)?;
            self.alloc_points = 0;
        }
        Ok(())
    }

    fn accrue(&mut self, pool_index: u128) -> Result<()> {
        let accrued = rewards_from_index(self.alloc_points, pool_index, self.vault_index)?;

        let creator_fee = if self.creator_fee_factor.is_zero() {
            0
        } else {
            mul_div_floor(accrued, self.creator_fee_factor.get(), UNIT)?
        };
        let boost_fee = if self.boost_fee_factor.is_zero() {
            0
        } else {
            mul_div_floor(accrued, self.boost_fee_factor.get(), UNIT)?
        };

        self.acc_total_rewards = add_u128(self.acc_total_rewards, accrued)?;
        self.acc_creator_rewards = add_u128(self.acc_creator_rewards, creator_fee)?;
        self.acc_boost_rewards = add_u128(self.acc_boost_rewards, boost_fee)?;

        let net = sub_u128(sub_u128(accrued, creator_fee)?, boost_fee)?;
        self.rewards_per_token = add_u128(
            self.rewards_per_token,
            mul_div_floor(net, UNIT, self.staked_principal)?,
        )?;

        if self.staked_boosts > 0 {
            // Per-boost truncation is intentional; dust stays in the pot.
            self.boost_index = add_u128(self.boost_index, boost_fee / self.staked_boosts as u128)?;
        }

        self.vault_index = pool_index;
        Ok(())
    }

    pub(crate) fn encode(&self, h: &mut CanonicalHasher) {
        h.bytes32(&self.vault_id.0);
        h.bytes32(&self.creator.0);
        h.u64(self.duration.seconds());
        h.u64(self.end_time);
        h.u128(self.multiplier);
        h.u128(self.staked_principal);
        h.u64(self.staked_boosts as u64);
        h.u128(self.alloc_points);
        h.u128(self.principal_limit);
        h.u128(self.creator_fee_factor.get());
        h.u128(self.boost_fee_factor.get());
        h.u128(self.vault_index);
        h.u128(self.boost_index);
        h.u128(self.rewards_per_token);
        h.u128(self.acc_total_rewards);
        h.u128(self.acc_creator_rewards);
        h.u128(self.acc_boost_rewards);
        h.u128(self.total_claimed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolParams;
    use crate::Hash32;

    fn acct(b: u8) -> AccountId {
        AccountId(Hash32([b; 32]))
    }

    fn pool() -> PoolState {
        let params = PoolParams::new(
            1,
            1 + 120 * 86_400,
            UNIT,
            11_000_000 * UNIT,
            acct(0xaa),
            acct(0xbb),
        )
        .unwrap();
        PoolState::from_params(&params)
    }

    fn tenth() -> Factor {
        Factor::new(UNIT / 10).unwrap()
    }

    fn vault(pool: &PoolState, created_at: u64) -> VaultState {
        VaultState::create(
            VaultId::derive(acct(1), created_at, 0),
            acct(1),
            DurationClass::Days30,
            created_at,
            tenth(),
            tenth(),
            pool.index,
        )
    }

    /// Stake principal directly against the ledgers, as the operations layer
    /// would after its prologue.
    fn stake(pool: &mut PoolState, v: &mut VaultState, amount: u128) {
        let delta = amount * v.multiplier;
        v.staked_principal += amount;
        v.alloc_points += delta;
        pool.total_alloc_points += delta;
    }

    #[test]
    fn fee_partition_sums_to_accrued() {
        let mut p = pool();
        let mut v = vault(&p, 2);
        v.sync(&mut p, 3).unwrap();
        stake(&mut p, &mut v, 50 * UNIT);

        v.sync(&mut p, 6).unwrap();
        // Three seconds of sole emission: 3e18 accrued, 10% + 10% fees.
        assert_eq!(v.acc_total_rewards, 3 * UNIT);
        assert_eq!(v.acc_creator_rewards, 3 * UNIT / 10);
        assert_eq!(v.acc_boost_rewards, 3 * UNIT / 10);
        let principal_pot =
            rewards_from_index(v.staked_principal, v.rewards_per_token, 0).unwrap();
        assert_eq!(
            principal_pot,
            v.acc_total_rewards - v.acc_creator_rewards - v.acc_boost_rewards
        );
    }

    #[test]
    fn zero_alloc_interval_is_dropped() {
        let mut p = pool();
        let mut v1 = vault(&p, 2);
        v1.sync(&mut p, 2).unwrap();
        stake(&mut p, &mut v1, 50 * UNIT);

        // A second vault sits empty while v1 earns.
        let mut v2 = VaultState::create(
            VaultId::derive(acct(2), 2, 0),
            acct(2),
            DurationClass::Days30,
            2,
            Factor::ZERO,
            Factor::ZERO,
            p.index,
        );
        v1.sync(&mut p, 10).unwrap();
        v2.sync(&mut p, 10).unwrap();
        assert_eq!(v2.acc_total_rewards, 0);
        // The empty vault's index snapped forward: staking now cannot reach
        // back into the earlier interval.
        assert_eq!(v2.vault_index, p.index);
    }

    #[test]
    fn boost_index_advances_only_with_boosts() {
        let mut p = pool();
        let mut v = vault(&p, 2);
        v.sync(&mut p, 2).unwrap();
        stake(&mut p, &mut v, 50 * UNIT);
        v.sync(&mut p, 5).unwrap();
        assert_eq!(v.boost_index, 0);
        assert!(v.acc_boost_rewards > 0);

        v.staked_boosts = 2;
        let pot_before = v.acc_boost_rewards;
        v.sync(&mut p, 6).unwrap();
        let fee_second = v.acc_boost_rewards - pot_before;
        assert_eq!(v.boost_index, fee_second / 2);
    }

    #[test]
    fn final_update_is_idempotent() {
        let mut p = pool();
        let mut v = vault(&p, 2);
        v.sync(&mut p, 2).unwrap();
        stake(&mut p, &mut v, 50 * UNIT);

        v.sync(&mut p, v.end_time).unwrap();
        assert_eq!(v.alloc_points, 0);
        assert_eq!(p.total_alloc_points, 0);
        let acc_at_maturity = v.acc_total_rewards;

        let snapshot = v.clone();
        v.sync(&mut p, v.end_time + 1_000).unwrap();
        assert_eq!(v, snapshot);
        assert_eq!(v.acc_total_rewards, acc_at_maturity);
    }
}
