//! Durable keyed store seam.
//!
//! The engine reads pool states and claim records one key at a time and
//! writes everything a single operation touched as one [`WriteBatch`], so a
//! backing store can commit each operation atomically.

use std::collections::BTreeMap;

use tidal_types::{Beneficiary, PoolId};

use crate::distributor::GovernanceState;
use crate::ledger::{ClaimKey, ClaimRecord};
use crate::pool::PoolState;
use crate::Result;

/// Everything one operation writes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub pools: Vec<PoolState>,
    pub claims: Vec<(ClaimKey, ClaimRecord)>,
    pub governance: Option<GovernanceState>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty() && self.claims.is_empty() && self.governance.is_none()
    }
}

/// Persistence for pool states, claim records and governance state.
pub trait RewardsStore {
    /// State of one pool, if it has been opened.
    fn pool_state(&self, pool: &PoolId) -> Result<Option<PoolState>>;

    /// Every opened pool.
    fn pool_states(&self) -> Result<Vec<PoolState>>;

    /// One claim record, if it has ever been credited.
    fn claim_record(&self, key: &ClaimKey) -> Result<Option<ClaimRecord>>;

    /// Every claim record of one beneficiary.
    fn claim_records_for(&self, beneficiary: &Beneficiary) -> Result<Vec<(PoolId, ClaimRecord)>>;

    /// The persisted governance state, if any.
    fn governance_state(&self) -> Result<Option<GovernanceState>>;

    /// Commit a batch atomically.
    fn apply(&mut self, batch: WriteBatch) -> Result<()>;
}

/// In-memory store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    pools: BTreeMap<PoolId, PoolState>,
    claims: BTreeMap<ClaimKey, ClaimRecord>,
    governance: Option<GovernanceState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RewardsStore for MemoryStore {
    fn pool_state(&self, pool: &PoolId) -> Result<Option<PoolState>> {
        Ok(self.pools.get(pool).cloned())
    }

    fn pool_states(&self) -> Result<Vec<PoolState>> {
        Ok(self.pools.values().cloned().collect())
    }

    fn claim_record(&self, key: &ClaimKey) -> Result<Option<ClaimRecord>> {
        Ok(self.claims.get(key).copied())
    }

    fn claim_records_for(&self, beneficiary: &Beneficiary) -> Result<Vec<(PoolId, ClaimRecord)>> {
        Ok(self
            .claims
            .iter()
            .filter(|(key, _)| key.beneficiary == *beneficiary)
            .map(|(key, record)| (key.pool, *record))
            .collect())
    }

    fn governance_state(&self) -> Result<Option<GovernanceState>> {
        Ok(self.governance.clone())
    }

    fn apply(&mut self, batch: WriteBatch) -> Result<()> {
        for state in batch.pools {
            self.pools.insert(state.pool, state);
        }
        for (key, record) in batch.claims {
            self.claims.insert(key, record);
        }
        if let Some(governance) = batch.governance {
            self.governance = Some(governance);
        }
        Ok(())
    }
}
