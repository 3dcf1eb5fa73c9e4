//! Per-beneficiary claim accounting.
//!
//! A [`ClaimRecord`] only ever grows: checkpoints raise `total_available`,
//! claims raise `total_claimed` up to it.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tidal_types::{Amount, Beneficiary, PoolId};

use crate::{math, Result, RewardsError};

/// Key of a claim record: one per pool and beneficiary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClaimKey {
    /// Pool the rewards accrue in.
    pub pool: PoolId,
    /// Depositor or stake position they accrue to.
    pub beneficiary: Beneficiary,
}

impl ClaimKey {
    pub fn new(pool: PoolId, beneficiary: Beneficiary) -> Self {
        Self { pool, beneficiary }
    }
}

/// Credited and settled totals for one beneficiary in one pool.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Everything ever credited.
    #[serde_as(as = "DisplayFromStr")]
    pub total_available: Amount,
    /// Everything ever paid out.
    #[serde_as(as = "DisplayFromStr")]
    pub total_claimed: Amount,
}

impl ClaimRecord {
    /// Credited but not yet paid out.
    pub fn unclaimed(&self) -> Amount {
        self.total_available.saturating_sub(self.total_claimed)
    }

    /// Credit `delta` to the record.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::ArithmeticOverflow`] on overflow
    pub fn credit(&mut self, delta: Amount) -> Result<()> {
        self.total_available = math::add(self.total_available, delta)?;
        Ok(())
    }

    /// Mark everything available as claimed and return the amount released.
    pub fn settle(&mut self) -> Amount {
        let released = self.unclaimed();
        self.total_claimed = self.total_available;
        released
    }
}

/// A beneficiary's weight inside a pool, as reported by the owning collaborator.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shares {
    /// The beneficiary's share balance (or boosted balance for stakes).
    #[serde_as(as = "DisplayFromStr")]
    pub share: u128,
    /// Sum of all share balances in the pool.
    #[serde_as(as = "DisplayFromStr")]
    pub total: u128,
}

impl Shares {
    pub const ZERO: Shares = Shares { share: 0, total: 0 };

    pub fn new(share: u128, total: u128) -> Self {
        Self { share, total }
    }

    /// Reject a share larger than the pool.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidInput`] if `share > total`
    pub fn validate(&self) -> Result<()> {
        if self.share > self.total {
            return Err(RewardsError::InvalidInput(format!(
                "beneficiary share {} exceeds pool total {}",
                self.share, self.total
            )));
        }
        Ok(())
    }

    /// The beneficiary's part of `pool_delta`; zero for an empty pool.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::ArithmeticOverflow`] on overflow
    pub fn portion_of(&self, pool_delta: Amount) -> Result<Amount> {
        math::mul_div(pool_delta, self.share, self.total)
    }
}
