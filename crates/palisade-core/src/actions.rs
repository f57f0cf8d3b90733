//! The engine's action space and its single dispatch point.
//!
//! [`Engine::apply`] funnels every verb through one chokepoint, which is what
//! the audit rail and the property tests drive: a trace is just a
//! `Vec<Action>`.

use serde::{Deserialize, Serialize};

use crate::engine::{Effects, Engine};
use crate::types::{AccountId, BoostId, VaultId};
use crate::Result;

/// State-transition inputs, one variant per public verb. `caller` is the
/// authenticated submitter (router or owner key); `on_behalf` is the end user
/// the router is acting for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    CreateVault {
        caller: AccountId,
        on_behalf: AccountId,
        period_days: u32,
        creator_fee: u128,
        boost_fee: u128,
        now: u64,
    },
    StakeTokens {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        amount: u128,
        now: u64,
    },
    StakeBoosts {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        ids: Vec<BoostId>,
        now: u64,
    },
    ClaimRewards {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        now: u64,
    },
    ClaimFees {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        now: u64,
    },
    UnstakeAll {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        now: u64,
    },
    IncreaseVaultLimit {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        amount: u128,
        now: u64,
    },
    UpdateCreatorFee {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        new_factor: u128,
        now: u64,
    },
    UpdateBoostFee {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
        new_factor: u128,
        now: u64,
    },
    UpdateVaults {
        caller: AccountId,
        vault_ids: Vec<VaultId>,
        now: u64,
    },
    UpdateEmission {
        caller: AccountId,
        extra_amount: u128,
        extra_duration: u64,
        now: u64,
    },
    Pause {
        caller: AccountId,
    },
    Unpause {
        caller: AccountId,
    },
    Freeze {
        caller: AccountId,
    },
    EmergencyExit {
        caller: AccountId,
        on_behalf: AccountId,
        vault_id: VaultId,
    },
}

/// Observable result of a successful action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    Unit,
    VaultCreated(VaultId),
    RewardsClaimed(u128),
    FeesClaimed(u128),
}

impl Engine {
    /// Execute one action. All verbs go through here for trace-driven
    /// testing; the typed methods remain the primary API.
    pub fn apply(&mut self, action: Action) -> Result<(ActionOutcome, Effects)> {
        match action {
            Action::CreateVault {
                caller,
                on_behalf,
                period_days,
                creator_fee,
                boost_fee,
                now,
            } => {
                let (vault_id, effects) =
                    self.create_vault(caller, on_behalf, period_days, creator_fee, boost_fee, now)?;
                Ok((ActionOutcome::VaultCreated(vault_id), effects))
            }
            Action::StakeTokens {
                caller,
                on_behalf,
                vault_id,
                amount,
                now,
            } => {
                let effects = self.stake_tokens(caller, on_behalf, vault_id, amount, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::StakeBoosts {
                caller,
                on_behalf,
                vault_id,
                ids,
                now,
            } => {
                let effects = self.stake_boosts(caller, on_behalf, vault_id, ids, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::ClaimRewards {
                caller,
                on_behalf,
                vault_id,
                now,
            } => {
                let (owed, effects) = self.claim_rewards(caller, on_behalf, vault_id, now)?;
                Ok((ActionOutcome::RewardsClaimed(owed), effects))
            }
            Action::ClaimFees {
                caller,
                on_behalf,
                vault_id,
                now,
            } => {
                let (owed, effects) = self.claim_fees(caller, on_behalf, vault_id, now)?;
                Ok((ActionOutcome::FeesClaimed(owed), effects))
            }
            Action::UnstakeAll {
                caller,
                on_behalf,
                vault_id,
                now,
            } => {
                let effects = self.unstake_all(caller, on_behalf, vault_id, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::IncreaseVaultLimit {
                caller,
                on_behalf,
                vault_id,
                amount,
                now,
            } => {
                let effects =
                    self.increase_vault_limit(caller, on_behalf, vault_id, amount, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::UpdateCreatorFee {
                caller,
                on_behalf,
                vault_id,
                new_factor,
                now,
            } => {
                let effects =
                    self.update_creator_fee(caller, on_behalf, vault_id, new_factor, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::UpdateBoostFee {
                caller,
                on_behalf,
                vault_id,
                new_factor,
                now,
            } => {
                let effects =
                    self.update_boost_fee(caller, on_behalf, vault_id, new_factor, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::UpdateVaults {
                caller,
                vault_ids,
                now,
            } => {
                let effects = self.update_vaults(caller, &vault_ids, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::UpdateEmission {
                caller,
                extra_amount,
                extra_duration,
                now,
            } => {
                let effects = self.update_emission(caller, extra_amount, extra_duration, now)?;
                Ok((ActionOutcome::Unit, effects))
            }
            Action::Pause { caller } => Ok((ActionOutcome::Unit, self.pause(caller)?)),
            Action::Unpause { caller } => Ok((ActionOutcome::Unit, self.unpause(caller)?)),
            Action::Freeze { caller } => Ok((ActionOutcome::Unit, self.freeze(caller)?)),
            Action::EmergencyExit {
                caller,
                on_behalf,
                vault_id,
            } => {
                let effects = self.emergency_exit(caller, on_behalf, vault_id)?;
                Ok((ActionOutcome::Unit, effects))
            }
        }
    }
}
