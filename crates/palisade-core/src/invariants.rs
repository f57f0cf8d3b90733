//! Whole-state invariant checking.
//!
//! Stable identifiers for the accounting invariants, used by the audit rail
//! and the property tests to label counterexamples.

use crate::engine::Engine;
use crate::types::GLOBAL_PRINCIPAL_CAP;
use crate::Hash32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvariantId {
    /// `rewards_emitted` exceeded the `total_rewards` envelope.
    EnvelopeRespected,

    /// Vault accruals exceeded what the pool actually emitted.
    EmittedCoversAccrual,

    /// `pool.total_alloc_points` disagreed with the sum of vault alloc-points
    /// (checked while not frozen).
    AllocSumMatches,

    /// A live vault's alloc-points disagreed with `staked_principal ×
    /// multiplier` (checked while not frozen).
    AllocDerivation,

    /// A vault exceeded its principal limit, or the limit exceeded the global
    /// cap.
    CapRespected,

    /// Fee pots exceeded the vault's total accrual, or user buckets exceeded
    /// their vault pot.
    FeePartitionConserves,

    /// A claimed bucket exceeded its accrued bucket.
    ClaimWithinAccrued,

    /// Vault stake totals disagreed with the sum over positions.
    StakeTotalsMatch,

    /// Pool index or emission total decreased between steps (rail-level).
    IndexMonotone,

    /// An action returned `Err` but the state hash changed (rail-level).
    NoMutationOnError,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvariantViolation {
    pub id: InvariantId,
    pub details: String,
}

impl InvariantViolation {
    pub fn new(id: InvariantId, details: impl Into<String>) -> Self {
        Self {
            id,
            details: details.into(),
        }
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.id, self.details)
    }
}

impl std::error::Error for InvariantViolation {}

/// A reproducible invariant failure with its minimal action prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Counterexample {
    pub violation: InvariantViolation,
    /// Index of the first action that leads to the violation.
    pub at_step: usize,
    /// State hash at detection time.
    pub state_hash: Hash32,
    /// Action prefix that reproduces the violation (includes the failing
    /// step).
    pub actions: Vec<crate::actions::Action>,
}

impl Counterexample {
    pub fn short(&self) -> String {
        format!(
            "invariant {:?} violated at step {} (state_hash={})",
            self.violation.id,
            self.at_step,
            hex::encode(self.state_hash.0)
        )
    }
}

/// Check every point-in-time invariant of the engine state.
pub fn check_invariants(eng: &Engine) -> Result<(), InvariantViolation> {
    let pool = eng.pool();

    if pool.rewards_emitted > pool.total_rewards {
        return Err(InvariantViolation::new(
            InvariantId::EnvelopeRespected,
            format!(
                "rewards_emitted {} > total_rewards {}",
                pool.rewards_emitted, pool.total_rewards
            ),
        ));
    }

    let mut alloc_sum: u128 = 0;
    let mut accrued_sum: u128 = 0;
    for vault in eng.vaults_iter() {
        alloc_sum = alloc_sum.saturating_add(vault.alloc_points);
        accrued_sum = accrued_sum.saturating_add(vault.acc_total_rewards);

        if vault.staked_principal > vault.principal_limit
            || vault.principal_limit > GLOBAL_PRINCIPAL_CAP
        {
            return Err(InvariantViolation::new(
                InvariantId::CapRespected,
                format!(
                    "vault {}: staked {} limit {} cap {}",
                    vault.vault_id, vault.staked_principal, vault.principal_limit,
                    GLOBAL_PRINCIPAL_CAP
                ),
            ));
        }

        if !pool.frozen && vault.alloc_points > 0 {
            let derived = vault
                .staked_principal
                .checked_mul(vault.multiplier)
                .unwrap_or(u128::MAX);
            if vault.alloc_points != derived {
                return Err(InvariantViolation::new(
                    InvariantId::AllocDerivation,
                    format!(
                        "vault {}: alloc {} != principal*multiplier {}",
                        vault.vault_id, vault.alloc_points, derived
                    ),
                ));
            }
        }

        let fee_pots = vault
            .acc_creator_rewards
            .saturating_add(vault.acc_boost_rewards);
        if fee_pots > vault.acc_total_rewards {
            return Err(InvariantViolation::new(
                InvariantId::FeePartitionConserves,
                format!(
                    "vault {}: fee pots {} > acc_total {}",
                    vault.vault_id, fee_pots, vault.acc_total_rewards
                ),
            ));
        }

        if vault.total_claimed > vault.acc_total_rewards {
            return Err(InvariantViolation::new(
                InvariantId::ClaimWithinAccrued,
                format!(
                    "vault {}: total_claimed {} > acc_total {}",
                    vault.vault_id, vault.total_claimed, vault.acc_total_rewards
                ),
            ));
        }
    }

    if !pool.frozen && pool.total_alloc_points != alloc_sum {
        return Err(InvariantViolation::new(
            InvariantId::AllocSumMatches,
            format!(
                "pool total_alloc {} != vault sum {}",
                pool.total_alloc_points, alloc_sum
            ),
        ));
    }

    if accrued_sum > pool.rewards_emitted {
        return Err(InvariantViolation::new(
            InvariantId::EmittedCoversAccrual,
            format!(
                "vault accruals {} > rewards_emitted {}",
                accrued_sum, pool.rewards_emitted
            ),
        ));
    }

    // Per-vault position aggregates.
    for vault in eng.vaults_iter() {
        let mut principal_sum: u128 = 0;
        let mut boost_count: u32 = 0;
        let mut staking_acc_sum: u128 = 0;
        for pos in eng.positions_iter().filter(|p| p.vault_id == vault.vault_id) {
            principal_sum = principal_sum.saturating_add(pos.staked_principal);
            boost_count = boost_count.saturating_add(pos.boost_ids.len() as u32);
            staking_acc_sum = staking_acc_sum.saturating_add(pos.acc_staking_rewards);

            if pos.claimed_staking_rewards > pos.acc_staking_rewards
                || pos.claimed_boost_rewards > pos.acc_boost_rewards
                || pos.claimed_creator_rewards > vault.acc_creator_rewards
            {
                return Err(InvariantViolation::new(
                    InvariantId::ClaimWithinAccrued,
                    format!("vault {} holder {}: claimed > accrued", vault.vault_id, pos.holder),
                ));
            }
        }

        if principal_sum != vault.staked_principal || boost_count != vault.staked_boosts {
            return Err(InvariantViolation::new(
                InvariantId::StakeTotalsMatch,
                format!(
                    "vault {}: positions hold {}/{} vs vault {}/{}",
                    vault.vault_id,
                    principal_sum,
                    boost_count,
                    vault.staked_principal,
                    vault.staked_boosts
                ),
            ));
        }

        // User staking accruals are paid out of the principal pot, which is
        // itself bounded by the net accrual.
        let net = vault
            .acc_total_rewards
            .saturating_sub(vault.acc_creator_rewards)
            .saturating_sub(vault.acc_boost_rewards);
        if staking_acc_sum > net {
            return Err(InvariantViolation::new(
                InvariantId::FeePartitionConserves,
                format!(
                    "vault {}: user staking accruals {} > principal pot {}",
                    vault.vault_id, staking_acc_sum, net
                ),
            ));
        }
    }

    Ok(())
}
