//! # tidal-emission
//!
//! The global reward emission curve.
//!
//! Emission starts at a fixed rate per epoch and decays by 1% at every
//! epoch boundary until the schedule ends. The decay is computed with
//! integer multiply-then-floor so every implementation reproduces the same
//! table bit for bit.
//!
//! ## Modules
//!
//! - [`schedule`] — Immutable schedule parameters
//! - [`clock`] — Rate lookup and emission integration

pub mod clock;
pub mod schedule;

pub use clock::EpochClock;
pub use schedule::EmissionSchedule;

/// Error types for emission operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmissionError {
    /// Schedule parameters are inconsistent.
    #[error("invalid emission schedule: {0}")]
    InvalidSchedule(String),

    /// Arithmetic overflow while integrating emission.
    #[error("arithmetic overflow in emission calculation")]
    Overflow,
}

/// Convenience result type for emission operations.
pub type Result<T> = std::result::Result<T, EmissionError>;
