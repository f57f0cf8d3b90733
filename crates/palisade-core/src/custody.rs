//! External collaborators and the effect executor.
//!
//! The engine never performs IO: it stages external effects as data. The
//! [`Executor`] owns the collaborator implementations, applies staged effects
//! after the state commit, and restores the pre-operation snapshot if any
//! collaborator call fails, so the whole operation is observably a no-op.

use std::collections::{BTreeMap, BTreeSet};

use crate::actions::{Action, ActionOutcome};
use crate::engine::{Effects, Engine};
use crate::types::{AccountId, BoostId, PoolParams, VaultId};
use crate::{PoolError, Result};

/// Records which boost assets sit in which vault.
///
/// Implementations must be idempotent per `(ids, vault_id)` pair: replaying a
/// record call after a crash must not double-book.
pub trait BoostRegistry {
    fn record_stake(&mut self, holder: AccountId, ids: &[BoostId], vault_id: VaultId)
        -> Result<()>;
    fn record_unstake(
        &mut self,
        holder: AccountId,
        ids: &[BoostId],
        vault_id: VaultId,
    ) -> Result<()>;
}

/// Holds the reward envelope and pays out claims.
pub trait RewardCustodian {
    fn total_vault_rewards(&self) -> u128;
    fn pay_rewards(&mut self, recipient: AccountId, amount: u128) -> Result<()>;
}

/// Standard fungible-token custody for the principal asset.
pub trait PrincipalCustodian {
    /// Pull `amount` from `from` into pool escrow.
    fn transfer_in(&mut self, from: AccountId, amount: u128) -> Result<()>;
    /// Push `amount` from pool escrow back to `to`.
    fn transfer_out(&mut self, to: AccountId, amount: u128) -> Result<()>;
}

/// Receipt-token ledger mirroring principal stakes 1:1.
pub trait ReceiptToken {
    fn mint(&mut self, to: AccountId, amount: u128) -> Result<()>;
    fn burn(&mut self, from: AccountId, amount: u128) -> Result<()>;
}

/// Engine plus collaborators: the transactional boundary of one operation.
pub struct Executor<R, C, P, T> {
    engine: Engine,
    registry: R,
    rewards: C,
    principal: P,
    receipts: T,
}

impl<R, C, P, T> Executor<R, C, P, T>
where
    R: BoostRegistry,
    C: RewardCustodian,
    P: PrincipalCustodian,
    T: ReceiptToken,
{
    /// Wire an engine to its collaborators.
    ///
    /// Fails closed unless the custodian actually holds the envelope the
    /// engine is allowed to emit.
    pub fn new(
        params: PoolParams,
        registry: R,
        rewards: C,
        principal: P,
        receipts: T,
    ) -> Result<Self> {
        if params.total_rewards() > rewards.total_vault_rewards() {
            return Err(PoolError::InvalidEmissionParameters);
        }
        Ok(Executor {
            engine: Engine::new(params),
            registry,
            rewards,
            principal,
            receipts,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Run one action end-to-end: engine transition, then external effects.
    /// If a collaborator fails, the engine is restored to its pre-action
    /// state and the error propagates.
    pub fn execute(&mut self, action: Action) -> Result<ActionOutcome> {
        let snapshot = self.engine.clone();
        let (outcome, effects) = self.engine.apply(action)?;
        if let Err(e) = self.apply_effects(&effects) {
            self.engine = snapshot;
            return Err(e);
        }
        Ok(outcome)
    }

    fn apply_effects(&mut self, effects: &Effects) -> Result<()> {
        if let Some((from, amount)) = effects.principal_in {
            self.principal.transfer_in(from, amount)?;
            self.receipts.mint(from, amount)?;
        }
        if let Some((to, amount)) = effects.principal_out {
            self.principal.transfer_out(to, amount)?;
            self.receipts.burn(to, amount)?;
        }
        if let Some((recipient, amount)) = effects.reward_payout {
            self.rewards.pay_rewards(recipient, amount)?;
        }
        if let Some((holder, ids, vault_id)) = &effects.boost_stakes {
            self.registry.record_stake(*holder, ids, *vault_id)?;
        }
        if let Some((holder, ids, vault_id)) = &effects.boost_unstakes {
            self.registry.record_unstake(*holder, ids, *vault_id)?;
        }
        Ok(())
    }
}

/// In-memory registry for simulation and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    staked: BTreeSet<(VaultId, BoostId)>,
}

impl BoostRegistry for MemoryRegistry {
    fn record_stake(
        &mut self,
        _holder: AccountId,
        ids: &[BoostId],
        vault_id: VaultId,
    ) -> Result<()> {
        for id in ids {
            self.staked.insert((vault_id, *id));
        }
        Ok(())
    }

    fn record_unstake(
        &mut self,
        _holder: AccountId,
        ids: &[BoostId],
        vault_id: VaultId,
    ) -> Result<()> {
        for id in ids {
            self.staked.remove(&(vault_id, *id));
        }
        Ok(())
    }
}

/// In-memory reward custodian for simulation and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryRewardCustodian {
    funded: u128,
    paid: BTreeMap<AccountId, u128>,
}

impl MemoryRewardCustodian {
    pub fn funded(amount: u128) -> Self {
        MemoryRewardCustodian {
            funded: amount,
            paid: BTreeMap::new(),
        }
    }

    pub fn paid_to(&self, recipient: AccountId) -> u128 {
        self.paid.get(&recipient).copied().unwrap_or(0)
    }
}

impl RewardCustodian for MemoryRewardCustodian {
    fn total_vault_rewards(&self) -> u128 {
        self.funded
    }

    fn pay_rewards(&mut self, recipient: AccountId, amount: u128) -> Result<()> {
        self.funded = self.funded.checked_sub(amount).ok_or(PoolError::Underflow)?;
        *self.paid.entry(recipient).or_insert(0) += amount;
        Ok(())
    }
}

/// In-memory principal ledger for simulation and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryPrincipalLedger {
    balances: BTreeMap<AccountId, u128>,
    escrow: u128,
}

impl MemoryPrincipalLedger {
    pub fn with_balance(account: AccountId, amount: u128) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(account, amount);
        MemoryPrincipalLedger {
            balances,
            escrow: 0,
        }
    }

    pub fn balance_of(&self, account: AccountId) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    pub fn escrow(&self) -> u128 {
        self.escrow
    }
}

impl PrincipalCustodian for MemoryPrincipalLedger {
    fn transfer_in(&mut self, from: AccountId, amount: u128) -> Result<()> {
        let balance = self.balances.entry(from).or_insert(0);
        *balance = balance.checked_sub(amount).ok_or(PoolError::InvalidAmount)?;
        self.escrow += amount;
        Ok(())
    }

    fn transfer_out(&mut self, to: AccountId, amount: u128) -> Result<()> {
        self.escrow = self.escrow.checked_sub(amount).ok_or(PoolError::Underflow)?;
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

/// In-memory receipt token for simulation and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryReceipts {
    supply: BTreeMap<AccountId, u128>,
}

impl MemoryReceipts {
    pub fn balance_of(&self, account: AccountId) -> u128 {
        self.supply.get(&account).copied().unwrap_or(0)
    }
}

impl ReceiptToken for MemoryReceipts {
    fn mint(&mut self, to: AccountId, amount: u128) -> Result<()> {
        *self.supply.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn burn(&mut self, from: AccountId, amount: u128) -> Result<()> {
        let balance = self.supply.entry(from).or_insert(0);
        *balance = balance.checked_sub(amount).ok_or(PoolError::Underflow)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNIT;
    use crate::Hash32;

    fn acct(b: u8) -> AccountId {
        AccountId(Hash32([b; 32]))
    }

    fn params() -> PoolParams {
        PoolParams::new(
            1,
            1 + 120 * 86_400,
            UNIT,
            11_000_000 * UNIT,
            acct(0xaa),
            acct(0xbb),
        )
        .unwrap()
    }

    fn executor(
        holder: AccountId,
    ) -> Executor<MemoryRegistry, MemoryRewardCustodian, MemoryPrincipalLedger, MemoryReceipts>
    {
        Executor::new(
            params(),
            MemoryRegistry::default(),
            MemoryRewardCustodian::funded(11_000_000 * UNIT),
            MemoryPrincipalLedger::with_balance(holder, 1_000 * UNIT),
            MemoryReceipts::default(),
        )
        .unwrap()
    }

    #[test]
    fn construction_checks_the_envelope() {
        let err = Executor::new(
            params(),
            MemoryRegistry::default(),
            MemoryRewardCustodian::funded(1),
            MemoryPrincipalLedger::default(),
            MemoryReceipts::default(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn stake_moves_principal_and_mints_receipts() {
        let holder = acct(7);
        let mut exec = executor(holder);
        let outcome = exec
            .execute(Action::CreateVault {
                caller: acct(0xbb),
                on_behalf: holder,
                period_days: 30,
                creator_fee: 0,
                boost_fee: 0,
                now: 2,
            })
            .unwrap();
        let ActionOutcome::VaultCreated(vault_id) = outcome else {
            panic!("expected vault id");
        };
        exec.execute(Action::StakeTokens {
            caller: acct(0xbb),
            on_behalf: holder,
            vault_id,
            amount: 50 * UNIT,
            now: 3,
        })
        .unwrap();
        assert_eq!(exec.principal.balance_of(holder), 950 * UNIT);
        assert_eq!(exec.principal.escrow(), 50 * UNIT);
        assert_eq!(exec.receipts.balance_of(holder), 50 * UNIT);
    }

    #[test]
    fn collaborator_failure_rolls_the_operation_back() {
        let holder = acct(7);
        let mut exec = executor(holder);
        let outcome = exec
            .execute(Action::CreateVault {
                caller: acct(0xbb),
                on_behalf: holder,
                period_days: 30,
                creator_fee: 0,
                boost_fee: 0,
                now: 2,
            })
            .unwrap();
        let ActionOutcome::VaultCreated(vault_id) = outcome else {
            panic!("expected vault id");
        };
        let hash_before = exec.engine().state_hash();
        // Within the vault limit but more than the holder's on-ledger
        // balance: the engine accepts, the transfer_in fails.
        let err = exec.execute(Action::StakeTokens {
            caller: acct(0xbb),
            on_behalf: holder,
            vault_id,
            amount: 5_000 * UNIT,
            now: 3,
        });
        assert!(err.is_err());
        assert_eq!(exec.engine().state_hash(), hash_before);
        assert_eq!(exec.principal.escrow(), 0);
    }
}
