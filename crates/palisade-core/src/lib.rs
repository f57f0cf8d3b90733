//! Palisade core: deterministic multi-vault staking-and-rewards accounting.
//!
//! The crate is an IO-free kernel: a single authoritative state machine that
//! allocates a bounded stream of reward tokens across competing vaults, across
//! principal stakes and boost assets, and across per-vault fee recipients.
//! Time is an input (`now` in integer seconds) on every mutating operation;
//! integration layers provide storage, transport and clocks.
//!
//! Design goals:
//! - Invalid states unrepresentable where practical (domain newtypes, validated
//!   parameter bundles).
//! - Deterministic and bounded arithmetic (256-bit intermediates, floor
//!   division); every overflow is a checked error, never a panic.
//! - Fail-closed on malformed or unauthorized inputs.
//! - External effects are data: operations return an [`engine::Effects`]
//!   record and an executor applies it against the custodian/registry
//!   collaborators, rolling the whole operation back on failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod actions;
pub mod audit;
pub mod bounds;
pub mod custody;
pub mod engine;
pub mod hash;
pub mod invariants;
pub mod math;
pub mod pool;
pub mod position;
pub mod types;
pub mod vault;

pub use actions::{Action, ActionOutcome};
pub use bounds::RuntimeBounds;
pub use custody::{BoostRegistry, Executor, PrincipalCustodian, ReceiptToken, RewardCustodian};
pub use engine::{Effects, Engine, PendingRewards};
pub use invariants::{Counterexample, InvariantId, InvariantViolation};
pub use pool::PoolState;
pub use position::Position;
pub use types::{AccountId, BoostId, DurationClass, Factor, PoolParams, VaultId, UNIT};
pub use vault::VaultState;

/// 32-byte identifier newtype used for accounts, vaults and boost assets.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl std::fmt::Display for Hash32 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Unified error type for pool operations.
///
/// Every operation failure maps to exactly one variant; operations are
/// all-or-nothing, so a returned error implies no state was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    // Timing
    #[error("pool has not started")]
    NotStarted,
    #[error("insufficient time left before pool end")]
    InsufficientTimeLeft,
    #[error("vault has matured")]
    VaultMatured,
    #[error("vault has not matured")]
    VaultNotMatured,
    #[error("staking period for this vault has ended")]
    StakingEnded,
    #[error("timestamp precedes last pool update")]
    StaleTimestamp,

    // Identity / auth
    #[error("incorrect caller")]
    IncorrectCaller,
    #[error("user is not the vault creator")]
    UserIsNotVaultCreator,
    #[error("vault does not exist")]
    NonExistentVault,

    // Shape
    #[error("invalid vault period")]
    InvalidVaultPeriod,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("invalid vault id")]
    InvalidVaultId,
    #[error("invalid router")]
    InvalidRouter,
    #[error("invalid emission parameters")]
    InvalidEmissionParameters,

    // Policy
    #[error("total fee factor exceeds unit")]
    TotalFeeFactorExceeded,
    #[error("creator fee can only be decreased")]
    CreatorFeeCanOnlyBeDecreased,
    #[error("boost fee can only be increased")]
    BoostFeeCanOnlyBeIncreased,
    #[error("boost staking limit exceeded")]
    BoostStakingLimitExceeded,
    #[error("staked token limit exceeded")]
    StakedTokenLimitExceeded,
    #[error("user has nothing staked")]
    UserHasNothingStaked,

    // Lifecycle
    #[error("pool is frozen")]
    PoolFrozen,
    #[error("pool is not frozen")]
    PoolNotFrozen,
    #[error("pool is paused")]
    PoolPaused,
    #[error("pool is not paused")]
    NotPaused,
    #[error("pool is already frozen")]
    AlreadyFrozen,

    // Arithmetic / rails
    #[error("arithmetic overflow")]
    Overflow,
    #[error("arithmetic underflow")]
    Underflow,
    #[error("runtime bounds exceeded")]
    BoundsExceeded,
}

pub type Result<T> = std::result::Result<T, PoolError>;
