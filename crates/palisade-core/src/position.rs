//! User ledger: per-(holder, vault) stake and reward buckets.

use serde::{Deserialize, Serialize};

use crate::hash::CanonicalHasher;
use crate::math::{add_u128, rewards_from_index, sub_u128};
use crate::types::{AccountId, BoostId, VaultId};
use crate::vault::VaultState;
use crate::Result;

/// One holder's stake in one vault.
///
/// `user_index` / `user_boost_index` are snapshots of the vault's
/// `rewards_per_token` / `boost_index` at the last user update; the deltas
/// since then are what the holder is owed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub holder: AccountId,
    pub vault_id: VaultId,
    pub staked_principal: u128,
    pub boost_ids: Vec<BoostId>,
    pub user_index: u128,
    pub user_boost_index: u128,
    pub acc_staking_rewards: u128,
    pub claimed_staking_rewards: u128,
    pub acc_boost_rewards: u128,
    pub claimed_boost_rewards: u128,
    pub claimed_creator_rewards: u128,
}

impl Position {
    /// Fresh position, indexed at the vault's current accumulators so no
    /// pre-entry interval can accrue to it.
    pub fn open(holder: AccountId, vault: &VaultState) -> Position {
        Position {
            holder,
            vault_id: vault.vault_id,
            staked_principal: 0,
            boost_ids: Vec::new(),
            user_index: vault.rewards_per_token,
            user_boost_index: vault.boost_index,
            acc_staking_rewards: 0,
            claimed_staking_rewards: 0,
            acc_boost_rewards: 0,
            claimed_boost_rewards: 0,
            claimed_creator_rewards: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.staked_principal == 0 && self.boost_ids.is_empty()
    }

    /// True when the record carries no stake and no reward history, i.e.
    /// nothing worth persisting.
    pub(crate) fn is_trivial(&self) -> bool {
        self.is_empty()
            && self.acc_staking_rewards == 0
            && self.claimed_staking_rewards == 0
            && self.acc_boost_rewards == 0
            && self.claimed_boost_rewards == 0
            && self.claimed_creator_rewards == 0
    }

    /// Book principal and boost accruals up to the vault's current indexes.
    /// The vault must already be synced to the pool.
    pub fn sync(&mut self, vault: &VaultState) -> Result<()> {
        if self.staked_principal > 0 && self.user_index != vault.rewards_per_token {
            let owed = rewards_from_index(
                self.staked_principal,
                vault.rewards_per_token,
                self.user_index,
            )?;
            self.acc_staking_rewards = add_u128(self.acc_staking_rewards, owed)?;
        }
        if !self.boost_ids.is_empty() && self.user_boost_index != vault.boost_index {
            let delta = sub_u128(vault.boost_index, self.user_boost_index)?;
            let owed = delta
                .checked_mul(self.boost_ids.len() as u128)
                .ok_or(crate::PoolError::Overflow)?;
            self.acc_boost_rewards = add_u128(self.acc_boost_rewards, owed)?;
        }
        self.user_index = vault.rewards_per_token;
        self.user_boost_index = vault.boost_index;
        Ok(())
    }

    /// Staking rewards accrued and not yet claimed.
    pub fn claimable_staking(&self) -> u128 {
        self.acc_staking_rewards
            .saturating_sub(self.claimed_staking_rewards)
    }

    /// Boost-fee rewards accrued and not yet claimed.
    pub fn claimable_boost(&self) -> u128 {
        self.acc_boost_rewards
            .saturating_sub(self.claimed_boost_rewards)
    }

    pub(crate) fn encode(&self, h: &mut CanonicalHasher) {
        h.bytes32(&self.holder.0);
        h.bytes32(&self.vault_id.0);
        h.u128(self.staked_principal);
        h.len(self.boost_ids.len());
        for id in &self.boost_ids {
            h.bytes32(&id.0);
        }
        h.u128(self.user_index);
        h.u128(self.user_boost_index);
        h.u128(self.acc_staking_rewards);
        h.u128(self.claimed_staking_rewards);
        h.u128(self.acc_boost_rewards);
        h.u128(self.claimed_boost_rewards);
        h.u128(self.claimed_creator_rewards);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolState;
    use crate::types::{DurationClass, Factor, PoolParams, UNIT};
    use crate::Hash32;

    fn acct(b: u8) -> AccountId {
        AccountId(Hash32([b; 32]))
    }

    fn setup() -> (PoolState, VaultState) {
        let params = PoolParams::new(
            1,
            1 + 120 * 86_400,
            UNIT,
            11_000_000 * UNIT,
            acct(0xaa),
            acct(0xbb),
        )
        .unwrap();
        let pool = PoolState::from_params(&params);
        let vault = VaultState::create(
            VaultId::derive(acct(1), 2, 0),
            acct(1),
            DurationClass::Days30,
            2,
            Factor::new(UNIT / 10).unwrap(),
            Factor::new(UNIT / 10).unwrap(),
            pool.index,
        );
        (pool, vault)
    }

    #[test]
    fn accrues_net_rewards_over_one_second() {
        let (mut pool, mut vault) = setup();
        vault.sync(&mut pool, 3).unwrap();

        let mut pos = Position::open(acct(7), &vault);
        pos.staked_principal = 50 * UNIT;
        vault.staked_principal = 50 * UNIT;
        vault.alloc_points = 50 * UNIT * vault.multiplier;
        pool.total_alloc_points = vault.alloc_points;

        vault.sync(&mut pool, 4).unwrap();
        pos.sync(&vault).unwrap();
        // 1e18 emitted, 20% skimmed as fees: the sole staker nets 0.8e18.
        assert_eq!(pos.acc_staking_rewards, 8 * UNIT / 10);
        assert_eq!(pos.claimable_staking(), 8 * UNIT / 10);
    }

    #[test]
    fn sync_is_idempotent_at_fixed_index() {
        let (mut pool, mut vault) = setup();
        vault.sync(&mut pool, 3).unwrap();
        let mut pos = Position::open(acct(7), &vault);
        pos.sync(&vault).unwrap();
        let snapshot = pos.clone();
        pos.sync(&vault).unwrap();
        assert_eq!(pos, snapshot);
    }

    #[test]
    fn boost_accrual_scales_with_held_ids() {
        let (mut pool, mut vault) = setup();
        vault.sync(&mut pool, 3).unwrap();
        let mut pos = Position::open(acct(7), &vault);
        pos.boost_ids = vec![BoostId(Hash32([9; 32])), BoostId(Hash32([10; 32]))];
        vault.boost_index = 500;
        pos.sync(&vault).unwrap();
        assert_eq!(pos.acc_boost_rewards, 1_000);
        assert_eq!(pos.user_boost_index, 500);
    }
}
