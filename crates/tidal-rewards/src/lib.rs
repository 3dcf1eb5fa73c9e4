//! # tidal-rewards
//!
//! Checkpoint-based reward accrual for vault depositors and stake positions.
//!
//! The global emission from [`tidal_emission::EpochClock`] is split across a
//! two-level weight hierarchy (vaults vs. staking, then per vault) and
//! attributed lazily: nothing moves until a collaborator checkpoints a pool
//! on behalf of a beneficiary, at which point the elapsed window is settled
//! into the pool's running total and the beneficiary's share is credited.
//!
//! ## Modules
//!
//! - [`weights`] — Weight split, per-vault weights, checkpoint-before-write
//! - [`pool`] — Per-pool running emission totals
//! - [`ledger`] — Per-beneficiary available/claimed totals
//! - [`accrual`] — The accrual engine
//! - [`claims`] — Claim settlement through the funding wallet
//! - [`directory`] — Pool ownership and recognition
//! - [`store`] — Durable keyed store seam and an in-memory store
//! - [`pause`] — Claim pause switch
//! - [`distributor`] — Governance-facing facade over all of the above
//! - [`math`] — Overflow-checked proportional arithmetic

pub mod accrual;
pub mod claims;
pub mod directory;
pub mod distributor;
pub mod ledger;
pub mod math;
pub mod pause;
pub mod pool;
pub mod store;
pub mod weights;

pub use accrual::{AccrualEngine, Checkpoint};
pub use claims::{
    ClaimProcessor, ClaimReceipt, ClaimRequest, ShareBook, ShareProvider, TokenLedger,
    TokenTransfer,
};
pub use directory::Collaborators;
pub use distributor::{
    GovernanceState, PendingRewards, RewardsDistributor, RewardsSummary, UnclaimedEntry,
};
pub use ledger::{ClaimKey, ClaimRecord, Shares};
pub use pause::PauseSwitch;
pub use pool::PoolState;
pub use store::{MemoryStore, RewardsStore, WriteBatch};
pub use weights::{WeightRatio, WeightRegistry, WeightSplit};

use tidal_emission::EmissionError;
use tidal_types::{Address, PoolId};

/// Error types for reward operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewardsError {
    /// Caller is not allowed to perform the action.
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        /// The rejected caller.
        caller: Address,
        /// What was attempted.
        action: String,
    },

    /// Pool id is unknown or not registered.
    #[error("invalid pool: {0}")]
    InvalidPool(PoolId),

    /// Arithmetic overflow; the operation is rejected and nothing is written.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// Weight configuration has a zero sum or an out-of-range parameter.
    #[error("invalid ratio: {0}")]
    InvalidRatio(String),

    /// Malformed arguments.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Claims are paused.
    #[error("claims are paused")]
    Paused,

    /// Token transfer out of the funding wallet failed.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Backing store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Emission schedule failure.
    #[error(transparent)]
    Emission(EmissionError),
}

impl From<EmissionError> for RewardsError {
    fn from(err: EmissionError) -> Self {
        match err {
            EmissionError::Overflow => RewardsError::ArithmeticOverflow,
            other => RewardsError::Emission(other),
        }
    }
}

impl RewardsError {
    /// Shorthand for [`RewardsError::Unauthorized`].
    pub fn unauthorized(caller: &Address, action: impl Into<String>) -> Self {
        RewardsError::Unauthorized {
            caller: *caller,
            action: action.into(),
        }
    }
}

/// Convenience result type for reward operations.
pub type Result<T> = std::result::Result<T, RewardsError>;
