//! # tidal-types
//!
//! Shared domain types used across the Tidal workspace: pool and
//! beneficiary identifiers, the event envelope, and protocol constants.

pub mod events;
pub mod ids;

pub use ids::{Address, Beneficiary, Category, PoolId, StakeId, VaultId};

/// Token amount in the smallest reward-token unit.
pub type Amount = u128;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Epoch duration in seconds (one average calendar month).
pub const EPOCH_DURATION_SECS: u64 = 2_629_743;

/// Default number of emission epochs (ten years).
pub const DEFAULT_EPOCH_COUNT: u64 = 120;

/// Default emission in the first epoch, in smallest token units.
pub const DEFAULT_INITIAL_RATE_PER_EPOCH: Amount = 34_255_400_000_000;

/// Per-epoch decay numerator (rate keeps 99%).
pub const DECAY_NUMERATOR: Amount = 99;

/// Per-epoch decay denominator.
pub const DECAY_DENOMINATOR: Amount = 100;

/// Errors produced while parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// Address is not 20 bytes of hex.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Pool identifier is neither `staking` nor `vault:<address>`.
    #[error("invalid pool id: {0}")]
    InvalidPoolId(String),

    /// Beneficiary is neither `depositor:<address>` nor `stake:<id>`.
    #[error("invalid beneficiary: {0}")]
    InvalidBeneficiary(String),
}
