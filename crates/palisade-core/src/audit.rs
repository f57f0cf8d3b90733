//! Trace-driven audit rail.
//!
//! Runs an action trace against a fresh engine and reports the first
//! invariant counterexample, including the action prefix that reproduces it.
//! Checked after every action:
//! - "no mutation on error": a failed action must leave the state hash
//!   unchanged;
//! - pool index and emission totals are monotone;
//! - every point-in-time invariant in [`crate::invariants::check_invariants`].

use crate::actions::Action;
use crate::bounds::RuntimeBounds;
use crate::engine::Engine;
use crate::invariants::{check_invariants, Counterexample, InvariantId, InvariantViolation};
use crate::types::PoolParams;
use crate::Result;

/// Run `actions` from a fresh engine and return the first counterexample, if
/// any.
pub fn first_counterexample(
    params: PoolParams,
    bounds: RuntimeBounds,
    actions: &[Action],
) -> Result<Option<Counterexample>> {
    let mut eng = Engine::new_with_bounds(params, bounds)?;
    let mut prev_index = eng.pool().index;
    let mut prev_emitted = eng.pool().rewards_emitted;

    for (i, action) in actions.iter().cloned().enumerate() {
        let before_hash = eng.state_hash();
        match eng.apply(action) {
            Err(e) => {
                let after_hash = eng.state_hash();
                if after_hash != before_hash {
                    return Ok(Some(Counterexample {
                        violation: InvariantViolation::new(
                            InvariantId::NoMutationOnError,
                            format!("action returned {e} but the state hash changed"),
                        ),
                        at_step: i,
                        state_hash: after_hash,
                        actions: actions[..=i].to_vec(),
                    }));
                }
            }
            Ok(_) => {
                let pool = eng.pool();
                if pool.index < prev_index || pool.rewards_emitted < prev_emitted {
                    return Ok(Some(Counterexample {
                        violation: InvariantViolation::new(
                            InvariantId::IndexMonotone,
                            format!(
                                "index {} -> {}, emitted {} -> {}",
                                prev_index, pool.index, prev_emitted, pool.rewards_emitted
                            ),
                        ),
                        at_step: i,
                        state_hash: eng.state_hash(),
                        actions: actions[..=i].to_vec(),
                    }));
                }
                if let Err(violation) = check_invariants(&eng) {
                    return Ok(Some(Counterexample {
                        violation,
                        at_step: i,
                        state_hash: eng.state_hash(),
                        actions: actions[..=i].to_vec(),
                    }));
                }
            }
        }
        prev_index = eng.pool().index;
        prev_emitted = eng.pool().rewards_emitted;
    }

    Ok(None)
}

/// Shrink a counterexample trace with deterministic delta debugging (ddmin),
/// preserving the violated invariant id. Returns `None` when the provided
/// trace no longer reproduces that invariant.
pub fn minimize_counterexample(
    params: PoolParams,
    bounds: RuntimeBounds,
    ce: &Counterexample,
) -> Result<Option<Counterexample>> {
    let want = ce.violation.id;

    let mut cur = ce.actions.clone();
    let Some(first) = first_counterexample(params.clone(), bounds, &cur)? else {
        return Ok(None);
    };
    if first.violation.id != want {
        return Ok(None);
    }
    cur = first.actions.clone();

    let mut n = 2usize;
    while cur.len() >= 2 {
        let len = cur.len();
        let chunk = len.div_ceil(n);
        let mut reduced = false;

        for start in (0..len).step_by(chunk) {
            let end = (start + chunk).min(len);
            if start == 0 && end == len {
                continue;
            }
            let mut candidate = Vec::with_capacity(len - (end - start));
            candidate.extend_from_slice(&cur[..start]);
            candidate.extend_from_slice(&cur[end..]);

            let Some(r) = first_counterexample(params.clone(), bounds, &candidate)? else {
                continue;
            };
            if r.violation.id != want {
                continue;
            }

            cur = r.actions.clone();
            n = n.saturating_sub(1).max(2);
            reduced = true;
            break;
        }

        if reduced {
            continue;
        }
        if n >= len {
            break;
        }
        n = (n * 2).min(len);
    }

    first_counterexample(params, bounds, &cur)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionOutcome;
    use crate::types::{AccountId, BoostId, VaultId, UNIT};
    use crate::Hash32;
    use proptest::prelude::*;

    const START: u64 = 1;

    fn acct(b: u8) -> AccountId {
        AccountId(Hash32([b; 32]))
    }

    fn owner() -> AccountId {
        acct(0xaa)
    }

    fn router() -> AccountId {
        acct(0xbb)
    }

    fn params() -> PoolParams {
        PoolParams::new(
            START,
            START + 400 * 86_400,
            UNIT,
            100_000_000 * UNIT,
            owner(),
            router(),
        )
        .unwrap()
    }

    /// Symbolic step: vault references are slots into the list of vaults the
    /// trace has managed to create so far, resolved while executing.
    #[derive(Clone, Debug)]
    enum Step {
        Create { user: u8, period: u8, cfee: u8, bfee: u8 },
        Stake { user: u8, slot: u8, units: u32 },
        Boost { user: u8, slot: u8, id: u8 },
        ClaimRewards { user: u8, slot: u8 },
        ClaimFees { user: u8, slot: u8 },
        Unstake { user: u8, slot: u8 },
        RaiseLimit { user: u8, slot: u8, units: u32 },
        LowerCreatorFee { user: u8, slot: u8, tenths: u8 },
        RaiseBoostFee { user: u8, slot: u8, tenths: u8 },
        UpdateAll,
        Emission { extra_units: u32, extra_secs: u32 },
        Pause,
        Unpause,
        Freeze,
        Exit { user: u8, slot: u8 },
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        let arms: Vec<proptest::strategy::BoxedStrategy<Step>> = vec![
            (1u8..5, 0u8..4, 0u8..6, 0u8..6)
                .prop_map(|(user, period, cfee, bfee)| Step::Create { user, period, cfee, bfee })
                .boxed(),
            (1u8..5, 0u8..4, 0u32..300_000)
                .prop_map(|(user, slot, units)| Step::Stake { user, slot, units })
                .boxed(),
            (1u8..5, 0u8..4, 0u8..8)
                .prop_map(|(user, slot, id)| Step::Boost { user, slot, id })
                .boxed(),
            (1u8..5, 0u8..4)
                .prop_map(|(user, slot)| Step::ClaimRewards { user, slot })
                .boxed(),
            (1u8..5, 0u8..4)
                .prop_map(|(user, slot)| Step::ClaimFees { user, slot })
                .boxed(),
            (1u8..5, 0u8..4)
                .prop_map(|(user, slot)| Step::Unstake { user, slot })
                .boxed(),
            (1u8..5, 0u8..4, 0u32..2_000_000)
                .prop_map(|(user, slot, units)| Step::RaiseLimit { user, slot, units })
                .boxed(),
            (1u8..5, 0u8..4, 0u8..6)
                .prop_map(|(user, slot, tenths)| Step::LowerCreatorFee { user, slot, tenths })
                .boxed(),
            (1u8..5, 0u8..4, 0u8..11)
                .prop_map(|(user, slot, tenths)| Step::RaiseBoostFee { user, slot, tenths })
                .boxed(),
            Just(Step::UpdateAll).boxed(),
            (0u32..1_000_000, 0u32..10_000_000)
                .prop_map(|(extra_units, extra_secs)| Step::Emission { extra_units, extra_secs })
                .boxed(),
            Just(Step::Pause).boxed(),
            Just(Step::Unpause).boxed(),
            Just(Step::Freeze).boxed(),
            (1u8..5, 0u8..4)
                .prop_map(|(user, slot)| Step::Exit { user, slot })
                .boxed(),
        ];
        proptest::strategy::Union::new(arms)
    }

    fn resolve_slot(created: &[VaultId], slot: u8) -> VaultId {
        if created.is_empty() {
            // Unresolvable reference: exercises the InvalidVaultId path.
            VaultId::default()
        } else {
            created[slot as usize % created.len()]
        }
    }

    /// Execute the symbolic trace once to resolve vault references, recording
    /// the concrete actions actually submitted.
    fn record_actions(steps: &[(Step, u32)]) -> Vec<Action> {
        let mut eng = Engine::new(params());
        let mut now = START + 1;
        let mut created: Vec<VaultId> = Vec::new();
        let mut recorded = Vec::with_capacity(steps.len());

        for (step, dt) in steps {
            now += u64::from(*dt);
            let action = match step.clone() {
                Step::Create { user, period, cfee, bfee } => Action::CreateVault {
                    caller: router(),
                    on_behalf: acct(user),
                    // Three valid classes plus one invalid period for the
                    // error path.
                    period_days: match period {
                        0 => 30,
                        1 => 60,
                        2 => 90,
                        _ => 45,
                    },
                    creator_fee: u128::from(cfee) * UNIT / 10,
                    boost_fee: u128::from(bfee) * UNIT / 10,
                    now,
                },
                Step::Stake { user, slot, units } => Action::StakeTokens {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    amount: u128::from(units) * UNIT,
                    now,
                },
                Step::Boost { user, slot, id } => Action::StakeBoosts {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    ids: vec![BoostId(Hash32([id; 32]))],
                    now,
                },
                Step::ClaimRewards { user, slot } => Action::ClaimRewards {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    now,
                },
                Step::ClaimFees { user, slot } => Action::ClaimFees {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    now,
                },
                Step::Unstake { user, slot } => Action::UnstakeAll {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    now,
                },
                Step::RaiseLimit { user, slot, units } => Action::IncreaseVaultLimit {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    amount: u128::from(units) * UNIT,
                    now,
                },
                Step::LowerCreatorFee { user, slot, tenths } => Action::UpdateCreatorFee {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    new_factor: u128::from(tenths) * UNIT / 10,
                    now,
                },
                Step::RaiseBoostFee { user, slot, tenths } => Action::UpdateBoostFee {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                    new_factor: u128::from(tenths) * UNIT / 10,
                    now,
                },
                Step::UpdateAll => Action::UpdateVaults {
                    caller: owner(),
                    vault_ids: created.clone(),
                    now,
                },
                Step::Emission { extra_units, extra_secs } => Action::UpdateEmission {
                    caller: owner(),
                    extra_amount: u128::from(extra_units) * UNIT,
                    extra_duration: u64::from(extra_secs),
                    now,
                },
                Step::Pause => Action::Pause { caller: owner() },
                Step::Unpause => Action::Unpause { caller: owner() },
                Step::Freeze => Action::Freeze { caller: owner() },
                Step::Exit { user, slot } => Action::EmergencyExit {
                    caller: router(),
                    on_behalf: acct(user),
                    vault_id: resolve_slot(&created, slot),
                },
            };
            if let Ok((ActionOutcome::VaultCreated(id), _)) = eng.apply(action.clone()) {
                created.push(id);
            }
            recorded.push(action);
        }
        recorded
    }

    #[test]
    fn clean_trace_has_no_counterexample() {
        let user = acct(1);
        let mut actions = vec![Action::CreateVault {
            caller: router(),
            on_behalf: user,
            period_days: 30,
            creator_fee: UNIT / 10,
            boost_fee: UNIT / 10,
            now: 2,
        }];
        // Resolve the real id the engine will derive.
        let vault_id = VaultId::derive(user, 2, 0);
        actions.push(Action::StakeTokens {
            caller: router(),
            on_behalf: user,
            vault_id,
            amount: 50 * UNIT,
            now: 3,
        });
        actions.push(Action::ClaimRewards {
            caller: router(),
            on_behalf: user,
            vault_id,
            now: 10,
        });
        actions.push(Action::UnstakeAll {
            caller: router(),
            on_behalf: user,
            vault_id,
            now: 3 + 30 * 86_400,
        });
        let ce = first_counterexample(params(), RuntimeBounds::default(), &actions).unwrap();
        assert!(ce.is_none(), "{}", ce.unwrap().short());
    }

    #[test]
    fn minimize_rejects_non_reproducing_trace() {
        let ce = Counterexample {
            violation: InvariantViolation::new(InvariantId::EnvelopeRespected, "fabricated"),
            at_step: 0,
            state_hash: Hash32::ZERO,
            actions: vec![Action::Pause { caller: owner() }],
        };
        let out = minimize_counterexample(params(), RuntimeBounds::default(), &ce).unwrap();
        assert!(out.is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Arbitrary interleavings of every verb keep I1–I6, monotonicity and
        /// no-mutation-on-error intact.
        #[test]
        fn random_traces_have_no_counterexample(
            steps in proptest::collection::vec((step_strategy(), 0u32..200_000), 1..40)
        ) {
            let actions = record_actions(&steps);
            let ce = first_counterexample(params(), RuntimeBounds::default(), &actions).unwrap();
            prop_assert!(ce.is_none(), "{}", ce.unwrap().short());
        }
    }
}
