//! Operations layer: the public verbs over the three ledgers.
//!
//! Every mutating verb follows the same shape: lifecycle guards, caller
//! authorization, then the update prologue (pool → vault → user) on *copies*
//! of the touched records, then business rules, then a single write-back.
//! A returned error therefore implies no state changed.
//!
//! External effects (token transfers, registry records, reward payouts) are
//! returned as data in [`Effects`]; see [`crate::custody::Executor`] for the
//! component that applies them and rolls the operation back if a collaborator
//! fails.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bounds::RuntimeBounds;
use crate::hash::CanonicalHasher;
use crate::math::{add_u128, sub_u128};
use crate::pool::PoolState;
use crate::position::Position;
use crate::types::{
    AccountId, BoostId, DurationClass, Factor, PoolParams, VaultId, BOOST_MULTIPLIER,
    GLOBAL_PRINCIPAL_CAP, MAX_BOOSTS_PER_VAULT, UNIT,
};
use crate::vault::VaultState;
use crate::{Hash32, PoolError, Result};

/// Staged external effects of one operation. Data only; nothing here has
/// happened yet when the engine returns.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effects {
    /// Pull principal from the holder into escrow and mint the 1:1 receipt.
    pub principal_in: Option<(AccountId, u128)>,
    /// Refund principal to the holder and burn the 1:1 receipt.
    pub principal_out: Option<(AccountId, u128)>,
    /// Pay rewards from the reward custodian.
    pub reward_payout: Option<(AccountId, u128)>,
    /// Record a boost stake with the registry.
    pub boost_stakes: Option<(AccountId, Vec<BoostId>, VaultId)>,
    /// Record a boost unstake with the registry.
    pub boost_unstakes: Option<(AccountId, Vec<BoostId>, VaultId)>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        *self == Effects::default()
    }
}

/// Claimable amounts as of a hypothetical update at `now`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingRewards {
    pub staking: u128,
    pub boost: u128,
    pub creator: u128,
}

/// The accounting engine: one pool, its vaults, and its positions.
///
/// The engine is a pure, single-writer state machine; `&mut self` verbs must
/// be serialized by the host (an exclusive lock or a single-writer queue).
/// Timestamps are supplied by the host and must be non-decreasing across
/// operations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engine {
    params: PoolParams,
    bounds: RuntimeBounds,
    pool: PoolState,
    vaults: BTreeMap<VaultId, VaultState>,
    positions: BTreeMap<(VaultId, AccountId), Position>,
}

impl Engine {
    pub fn new(params: PoolParams) -> Engine {
        let pool = PoolState::from_params(&params);
        Engine {
            params,
            bounds: RuntimeBounds::default(),
            pool,
            vaults: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    pub fn new_with_bounds(params: PoolParams, bounds: RuntimeBounds) -> Result<Engine> {
        bounds.validate()?;
        let mut eng = Engine::new(params);
        eng.bounds = bounds;
        Ok(eng)
    }

    pub fn params(&self) -> &PoolParams {
        &self.params
    }

    pub fn bounds(&self) -> RuntimeBounds {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: RuntimeBounds) -> Result<()> {
        bounds.validate()?;
        self.bounds = bounds;
        Ok(())
    }

    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    pub fn vault(&self, vault_id: VaultId) -> Option<&VaultState> {
        self.vaults.get(&vault_id)
    }

    pub fn position(&self, vault_id: VaultId, holder: AccountId) -> Option<&Position> {
        self.positions.get(&(vault_id, holder))
    }

    pub fn vaults_iter(&self) -> impl Iterator<Item = &VaultState> {
        self.vaults.values()
    }

    pub fn positions_iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Deterministic commitment over pool, vaults and positions.
    pub fn state_hash(&self) -> Hash32 {
        let mut h = CanonicalHasher::new(b"PALISADE_STATE_V1");
        self.pool.encode(&mut h);
        h.len(self.vaults.len());
        for vault in self.vaults.values() {
            vault.encode(&mut h);
        }
        h.len(self.positions.len());
        for pos in self.positions.values() {
            pos.encode(&mut h);
        }
        h.finish()
    }

    // ---- lifecycle guards ------------------------------------------------

    fn ensure_live(&self, now: u64) -> Result<()> {
        if self.pool.frozen {
            return Err(PoolError::PoolFrozen);
        }
        if self.pool.paused {
            return Err(PoolError::PoolPaused);
        }
        if now < self.params.start_time() {
            return Err(PoolError::NotStarted);
        }
        if now < self.pool.last_update_timestamp {
            return Err(PoolError::StaleTimestamp);
        }
        Ok(())
    }

    fn ensure_router(&self, caller: AccountId) -> Result<()> {
        if caller != self.params.router() {
            return Err(PoolError::IncorrectCaller);
        }
        Ok(())
    }

    fn ensure_owner(&self, caller: AccountId) -> Result<()> {
        if caller != self.params.owner() {
            return Err(PoolError::IncorrectCaller);
        }
        Ok(())
    }

    // ---- record loading --------------------------------------------------

    fn vault_copy(&self, vault_id: VaultId) -> Result<VaultState> {
        if vault_id.is_zero() {
            return Err(PoolError::InvalidVaultId);
        }
        self.vaults
            .get(&vault_id)
            .cloned()
            .ok_or(PoolError::NonExistentVault)
    }

    fn position_copy(&self, vault: &VaultState, holder: AccountId) -> Position {
        self.positions
            .get(&(vault.vault_id, holder))
            .cloned()
            .unwrap_or_else(|| Position::open(holder, vault))
    }

    fn ensure_position_capacity(&self, vault_id: VaultId, holder: AccountId) -> Result<()> {
        if self.positions.contains_key(&(vault_id, holder)) {
            return Ok(());
        }
        let count = self
            .positions
            .range((vault_id, AccountId::MIN)..=(vault_id, AccountId::MAX))
            .count();
        if count >= self.bounds.max_positions_per_vault {
            return Err(PoolError::BoundsExceeded);
        }
        Ok(())
    }

    fn commit(&mut self, pool: PoolState, vault: Option<VaultState>, pos: Option<Position>) {
        self.pool = pool;
        if let Some(v) = vault {
            self.vaults.insert(v.vault_id, v);
        }
        if let Some(p) = pos {
            let key = (p.vault_id, p.holder);
            // A never-staked, never-paid record is not worth a ledger entry.
            if self.positions.contains_key(&key) || !p.is_trivial() {
                self.positions.insert(key, p);
            }
        }
    }

    // ---- operations ------------------------------------------------------

    /// Create a vault for `on_behalf` with the given duration class and fee
    /// factors. Returns the new vault id.
    pub fn create_vault(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        period_days: u32,
        creator_fee: u128,
        boost_fee: u128,
        now: u64,
    ) -> Result<(VaultId, Effects)> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        let duration = DurationClass::try_from_days(period_days)?;
        if creator_fee
            .checked_add(boost_fee)
            .map(|sum| sum > UNIT)
            .unwrap_or(true)
        {
            return Err(PoolError::TotalFeeFactorExceeded);
        }
        let creator_fee = Factor::new(creator_fee)?;
        let boost_fee = Factor::new(boost_fee)?;
        let vault_end = now
            .checked_add(duration.seconds())
            .ok_or(PoolError::Overflow)?;
        if vault_end >= self.pool.end_time {
            return Err(PoolError::InsufficientTimeLeft);
        }
        if self.vaults.len() >= self.bounds.max_vaults {
            return Err(PoolError::BoundsExceeded);
        }

        let mut pool = self.pool.clone();
        pool.update(now)?;

        let mut vault_id = None;
        for salt in 0..self.bounds.max_id_retries {
            let candidate = VaultId::derive(on_behalf, now, salt);
            if !candidate.is_zero() && !self.vaults.contains_key(&candidate) {
                vault_id = Some(candidate);
                break;
            }
        }
        let vault_id = vault_id.ok_or(PoolError::InvalidVaultId)?;

        let vault = VaultState::create(
            vault_id, on_behalf, duration, now, creator_fee, boost_fee, pool.index,
        );
        info!(vault = %vault_id, creator = %on_behalf, %period_days, "vault created");
        self.commit(pool, Some(vault), None);
        Ok((vault_id, Effects::default()))
    }

    /// Stake principal into a live vault on behalf of `on_behalf`.
    pub fn stake_tokens(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        amount: u128,
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let mut vault = self.vault_copy(vault_id)?;
        if vault.matured(now) {
            return Err(PoolError::StakingEnded);
        }
        let new_total = add_u128(vault.staked_principal, amount)?;
        if new_total > vault.principal_limit.min(GLOBAL_PRINCIPAL_CAP) {
            return Err(PoolError::StakedTokenLimitExceeded);
        }
        self.ensure_position_capacity(vault_id, on_behalf)?;

        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        let mut pos = self.position_copy(&vault, on_behalf);
        pos.sync(&vault)?;

        let delta = amount
            .checked_mul(vault.multiplier)
            .ok_or(PoolError::Overflow)?;
        vault.staked_principal = new_total;
        vault.alloc_points = add_u128(vault.alloc_points, delta)?;
        pool.total_alloc_points = add_u128(pool.total_alloc_points, delta)?;
        pos.staked_principal = add_u128(pos.staked_principal, amount)?;

        debug!(vault = %vault_id, holder = %on_behalf, %amount, "principal staked");
        self.commit(pool, Some(vault), Some(pos));
        Ok(Effects {
            principal_in: Some((on_behalf, amount)),
            ..Effects::default()
        })
    }

    /// Stake boost assets into a live vault. The first boost ever staked into
    /// a vault backfills the holder's boost bucket with the vault's already
    /// accrued boost-fee pot.
    pub fn stake_boosts(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        ids: Vec<BoostId>,
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        if ids.is_empty() {
            return Err(PoolError::InvalidAmount);
        }
        if ids.len() as u32 >= MAX_BOOSTS_PER_VAULT {
            return Err(PoolError::BoostStakingLimitExceeded);
        }
        let mut vault = self.vault_copy(vault_id)?;
        if vault.matured(now) {
            return Err(PoolError::StakingEnded);
        }
        let new_count = vault.staked_boosts + ids.len() as u32;
        if new_count > MAX_BOOSTS_PER_VAULT {
            return Err(PoolError::BoostStakingLimitExceeded);
        }
        self.ensure_position_capacity(vault_id, on_behalf)?;
        let existing = self.positions.get(&(vault_id, on_behalf));
        for id in &ids {
            let dup_in_call = ids.iter().filter(|other| *other == id).count() > 1;
            let dup_held = existing.is_some_and(|p| p.boost_ids.contains(id));
            if dup_in_call || dup_held {
                return Err(PoolError::InvalidAmount);
            }
        }

        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        let mut pos = self.position_copy(&vault, on_behalf);
        pos.sync(&vault)?;

        let was_first = vault.staked_boosts == 0;
        vault.staked_boosts = new_count;
        vault.multiplier = add_u128(
            vault.multiplier,
            BOOST_MULTIPLIER
                .checked_mul(ids.len() as u128)
                .ok_or(PoolError::Overflow)?,
        )?;
        if vault.staked_principal > 0 {
            let new_alloc = vault
                .staked_principal
                .checked_mul(vault.multiplier)
                .ok_or(PoolError::Overflow)?;
            let delta = sub_u128(new_alloc, vault.alloc_points)?;
            pool.total_alloc_points = add_u128(pool.total_alloc_points, delta)?;
            vault.alloc_points = new_alloc;
        }
        pos.boost_ids.extend_from_slice(&ids);
        if was_first {
            pos.acc_boost_rewards = vault.acc_boost_rewards;
        }

        debug!(vault = %vault_id, holder = %on_behalf, staked = ids.len(), "boosts staked");
        self.commit(pool, Some(vault), Some(pos));
        Ok(Effects {
            boost_stakes: Some((on_behalf, ids, vault_id)),
            ..Effects::default()
        })
    }

    /// Claim accrued principal-staking rewards. Returns the amount owed,
    /// which is zero when nothing has accrued since the last claim.
    pub fn claim_rewards(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        now: u64,
    ) -> Result<(u128, Effects)> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        let mut vault = self.vault_copy(vault_id)?;
        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        let mut pos = self.position_copy(&vault, on_behalf);
        pos.sync(&vault)?;

        let owed = pos.claimable_staking();
        pos.claimed_staking_rewards = add_u128(pos.claimed_staking_rewards, owed)?;
        vault.total_claimed = add_u128(vault.total_claimed, owed)?;

        debug!(vault = %vault_id, holder = %on_behalf, %owed, "staking rewards claimed");
        self.commit(pool, Some(vault), Some(pos));
        let effects = Effects {
            reward_payout: (owed > 0).then_some((on_behalf, owed)),
            ..Effects::default()
        };
        Ok((owed, effects))
    }

    /// Claim fee-side rewards: the creator pot when `on_behalf` is the vault
    /// creator, and the holder's boost pot. The two buckets are independent
    /// and paid as one transfer.
    pub fn claim_fees(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        now: u64,
    ) -> Result<(u128, Effects)> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        let mut vault = self.vault_copy(vault_id)?;
        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        let mut pos = self.position_copy(&vault, on_behalf);
        pos.sync(&vault)?;

        let mut owed = 0u128;
        if on_behalf == vault.creator {
            let creator_owed = vault
                .acc_creator_rewards
                .saturating_sub(pos.claimed_creator_rewards);
            pos.claimed_creator_rewards =
                add_u128(pos.claimed_creator_rewards, creator_owed)?;
            owed = add_u128(owed, creator_owed)?;
        }
        let boost_owed = pos.claimable_boost();
        if boost_owed > 0 {
            pos.claimed_boost_rewards = add_u128(pos.claimed_boost_rewards, boost_owed)?;
            owed = add_u128(owed, boost_owed)?;
        }
        vault.total_claimed = add_u128(vault.total_claimed, owed)?;

        debug!(vault = %vault_id, holder = %on_behalf, %owed, "fee rewards claimed");
        self.commit(pool, Some(vault), Some(pos));
        let effects = Effects {
            reward_payout: (owed > 0).then_some((on_behalf, owed)),
            ..Effects::default()
        };
        Ok((owed, effects))
    }

    /// Return a matured vault's principal and boosts to the holder. Accrued
    /// and claimed buckets are untouched; rewards stay claimable afterwards.
    pub fn unstake_all(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        let mut vault = self.vault_copy(vault_id)?;
        if !vault.matured(now) {
            return Err(PoolError::VaultNotMatured);
        }
        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        let mut pos = self.position_copy(&vault, on_behalf);
        pos.sync(&vault)?;
        if pos.is_empty() {
            return Err(PoolError::UserHasNothingStaked);
        }

        let amount = pos.staked_principal;
        vault.staked_principal = sub_u128(vault.staked_principal, amount)?;
        vault.staked_boosts = vault
            .staked_boosts
            .checked_sub(pos.boost_ids.len() as u32)
            .ok_or(PoolError::Underflow)?;
        pos.staked_principal = 0;
        let boosts = std::mem::take(&mut pos.boost_ids);

        info!(vault = %vault_id, holder = %on_behalf, %amount, "unstaked after maturity");
        self.commit(pool, Some(vault), Some(pos));
        Ok(Effects {
            principal_out: (amount > 0).then_some((on_behalf, amount)),
            boost_unstakes: (!boosts.is_empty()).then_some((on_behalf, boosts, vault_id)),
            ..Effects::default()
        })
    }

    /// Raise a vault's principal limit; creator only, bounded by the global
    /// cap. Limits never decrease.
    pub fn increase_vault_limit(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        amount: u128,
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let mut vault = self.vault_copy(vault_id)?;
        if on_behalf != vault.creator {
            return Err(PoolError::UserIsNotVaultCreator);
        }
        if vault.matured(now) {
            return Err(PoolError::VaultMatured);
        }
        let new_limit = add_u128(vault.principal_limit, amount)?;
        if new_limit > GLOBAL_PRINCIPAL_CAP {
            return Err(PoolError::StakedTokenLimitExceeded);
        }

        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        vault.principal_limit = new_limit;

        self.commit(pool, Some(vault), None);
        Ok(Effects::default())
    }

    /// Lower the creator fee factor. Accruals up to `now` are booked at the
    /// old factor before the change takes effect.
    pub fn update_creator_fee(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        new_factor: u128,
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        let mut vault = self.vault_copy(vault_id)?;
        if on_behalf != vault.creator {
            return Err(PoolError::UserIsNotVaultCreator);
        }
        if vault.matured(now) {
            return Err(PoolError::VaultMatured);
        }
        if new_factor >= vault.creator_fee_factor.get() {
            return Err(PoolError::CreatorFeeCanOnlyBeDecreased);
        }
        if new_factor
            .checked_add(vault.boost_fee_factor.get())
            .map(|sum| sum > UNIT)
            .unwrap_or(true)
        {
            return Err(PoolError::TotalFeeFactorExceeded);
        }

        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        vault.creator_fee_factor = Factor::new(new_factor)?;

        info!(vault = %vault_id, %new_factor, "creator fee updated");
        self.commit(pool, Some(vault), None);
        Ok(Effects::default())
    }

    /// Raise the boost fee factor. Accruals up to `now` are booked at the old
    /// factor before the change takes effect.
    pub fn update_boost_fee(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        new_factor: u128,
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        self.ensure_router(caller)?;
        let mut vault = self.vault_copy(vault_id)?;
        if on_behalf != vault.creator {
            return Err(PoolError::UserIsNotVaultCreator);
        }
        if vault.matured(now) {
            return Err(PoolError::VaultMatured);
        }
        if new_factor <= vault.boost_fee_factor.get() {
            return Err(PoolError::BoostFeeCanOnlyBeIncreased);
        }
        if new_factor
            .checked_add(vault.creator_fee_factor.get())
            .map(|sum| sum > UNIT)
            .unwrap_or(true)
        {
            return Err(PoolError::TotalFeeFactorExceeded);
        }

        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        vault.boost_fee_factor = Factor::new(new_factor)?;

        info!(vault = %vault_id, %new_factor, "boost fee updated");
        self.commit(pool, Some(vault), None);
        Ok(Effects::default())
    }

    /// Bookkeeping-only batch update of vault indexes. Callable by the router
    /// or the owner.
    pub fn update_vaults(
        &mut self,
        caller: AccountId,
        vault_ids: &[VaultId],
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        if caller != self.params.router() && caller != self.params.owner() {
            return Err(PoolError::IncorrectCaller);
        }
        if vault_ids.len() > self.bounds.max_update_batch {
            return Err(PoolError::BoundsExceeded);
        }

        let mut pool = self.pool.clone();
        let mut staged: BTreeMap<VaultId, VaultState> = BTreeMap::new();
        for vault_id in vault_ids {
            let mut vault = match staged.remove(vault_id) {
                Some(v) => v,
                None => self.vault_copy(*vault_id)?,
            };
            vault.sync(&mut pool, now)?;
            staged.insert(*vault_id, vault);
        }

        self.pool = pool;
        for (id, vault) in staged {
            self.vaults.insert(id, vault);
        }
        Ok(Effects::default())
    }

    /// Grow the reward envelope and/or extend the schedule; the emission rate
    /// is recomputed so the remaining envelope drains exactly over the
    /// remaining time.
    pub fn update_emission(
        &mut self,
        caller: AccountId,
        extra_amount: u128,
        extra_duration: u64,
        now: u64,
    ) -> Result<Effects> {
        self.ensure_live(now)?;
        self.ensure_owner(caller)?;
        if extra_amount == 0 && extra_duration == 0 {
            return Err(PoolError::InvalidEmissionParameters);
        }
        if now >= self.pool.end_time {
            return Err(PoolError::InsufficientTimeLeft);
        }

        let mut pool = self.pool.clone();
        pool.update(now)?;
        let total_rewards = add_u128(pool.total_rewards, extra_amount)?;
        let new_end = pool
            .end_time
            .checked_add(extra_duration)
            .ok_or(PoolError::Overflow)?;
        let remaining = sub_u128(total_rewards, pool.rewards_emitted)?;
        let eps = remaining / (new_end - now) as u128;
        if eps == 0 {
            return Err(PoolError::InvalidEmissionParameters);
        }
        pool.total_rewards = total_rewards;
        pool.end_time = new_end;
        pool.emission_per_second = eps;

        info!(%eps, new_end, "emission updated");
        self.commit(pool, None, None);
        Ok(Effects::default())
    }

    pub fn pause(&mut self, caller: AccountId) -> Result<Effects> {
        self.ensure_owner(caller)?;
        if self.pool.frozen {
            return Err(PoolError::PoolFrozen);
        }
        if self.pool.paused {
            return Err(PoolError::PoolPaused);
        }
        self.pool.paused = true;
        info!("pool paused");
        Ok(Effects::default())
    }

    pub fn unpause(&mut self, caller: AccountId) -> Result<Effects> {
        self.ensure_owner(caller)?;
        if self.pool.frozen {
            return Err(PoolError::PoolFrozen);
        }
        if !self.pool.paused {
            return Err(PoolError::NotPaused);
        }
        self.pool.paused = false;
        info!("pool unpaused");
        Ok(Effects::default())
    }

    /// Freeze a paused pool. Terminal: only [`Engine::emergency_exit`] is
    /// accepted afterwards.
    pub fn freeze(&mut self, caller: AccountId) -> Result<Effects> {
        self.ensure_owner(caller)?;
        if self.pool.frozen {
            return Err(PoolError::AlreadyFrozen);
        }
        if !self.pool.paused {
            return Err(PoolError::NotPaused);
        }
        self.pool.frozen = true;
        warn!("pool frozen");
        Ok(Effects::default())
    }

    /// Return a holder's principal and boosts from a frozen pool without
    /// advancing any index. `alloc_points`, `multiplier` and the pool's
    /// `total_alloc_points` are deliberately left as they were, so the
    /// pre-incident allocation picture stays reconstructible.
    pub fn emergency_exit(
        &mut self,
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
    ) -> Result<Effects> {
        self.ensure_router(caller)?;
        if !self.pool.paused {
            return Err(PoolError::NotPaused);
        }
        if !self.pool.frozen {
            return Err(PoolError::PoolNotFrozen);
        }
        let mut vault = self.vault_copy(vault_id)?;
        let mut pos = self
            .positions
            .get(&(vault_id, on_behalf))
            .cloned()
            .ok_or(PoolError::UserHasNothingStaked)?;
        if pos.is_empty() {
            return Err(PoolError::UserHasNothingStaked);
        }

        let amount = pos.staked_principal;
        vault.staked_principal = sub_u128(vault.staked_principal, amount)?;
        vault.staked_boosts = vault
            .staked_boosts
            .checked_sub(pos.boost_ids.len() as u32)
            .ok_or(PoolError::Underflow)?;
        pos.staked_principal = 0;
        let boosts = std::mem::take(&mut pos.boost_ids);

        warn!(vault = %vault_id, holder = %on_behalf, %amount, "emergency exit");
        self.vaults.insert(vault_id, vault);
        self.positions.insert((vault_id, on_behalf), pos);
        Ok(Effects {
            principal_out: (amount > 0).then_some((on_behalf, amount)),
            boost_unstakes: (!boosts.is_empty()).then_some((on_behalf, boosts, vault_id)),
            ..Effects::default()
        })
    }

    /// What a claim at `now` would pay, computed without mutating state.
    pub fn preview_rewards(
        &self,
        vault_id: VaultId,
        holder: AccountId,
        now: u64,
    ) -> Result<PendingRewards> {
        let mut vault = self.vault_copy(vault_id)?;
        let mut pool = self.pool.clone();
        vault.sync(&mut pool, now)?;
        let mut pos = self.position_copy(&vault, holder);
        pos.sync(&vault)?;
        let creator = if holder == vault.creator {
            vault
                .acc_creator_rewards
                .saturating_sub(pos.claimed_creator_rewards)
        } else {
            0
        };
        Ok(PendingRewards {
            staking: pos.claimable_staking(),
            boost: pos.claimable_boost(),
            creator,
        })
    }
}
