//! SQLite-backed [`RewardsStore`].
//!
//! Every [`WriteBatch`] commits inside one SQLite transaction. Governance
//! state is spread over settings rows: `admin`, `funding_wallet`,
//! `claims_paused`, and the JSON-encoded `weights` and `collaborators`.

use rusqlite::Connection;
use tidal_rewards::{
    ClaimKey, ClaimRecord, GovernanceState, PoolState, RewardsStore, WriteBatch,
};
use tidal_types::{Beneficiary, PoolId};

use crate::queries::{claims, pools, settings};
use crate::{parse_text, DbError, Result};

const ADMIN: &str = "admin";
const FUNDING_WALLET: &str = "funding_wallet";
const CLAIMS_PAUSED: &str = "claims_paused";
const WEIGHTS: &str = "weights";
const COLLABORATORS: &str = "collaborators";

/// Durable rewards store over one SQLite connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Open the database at `path` and wrap it.
    pub fn open(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(crate::open(path)?))
    }

    /// An in-memory store (for testing).
    pub fn open_memory() -> Result<Self> {
        Ok(Self::new(crate::open_memory()?))
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn load_governance(&self) -> Result<Option<GovernanceState>> {
        let admin = match settings::get(&self.conn, ADMIN) {
            Ok(admin) => admin,
            Err(DbError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let registry = settings::get_json(&self.conn, WEIGHTS)?
            .ok_or_else(|| DbError::NotFound(format!("setting '{WEIGHTS}'")))?;
        let collaborators = settings::get_json(&self.conn, COLLABORATORS)?
            .ok_or_else(|| DbError::NotFound(format!("setting '{COLLABORATORS}'")))?;
        let funding_wallet = settings::get(&self.conn, FUNDING_WALLET)?;

        Ok(Some(GovernanceState {
            admin: parse_text(ADMIN, &admin)?,
            registry,
            collaborators,
            funding_wallet: parse_text(FUNDING_WALLET, &funding_wallet)?,
            claims_paused: settings::get_bool(&self.conn, CLAIMS_PAUSED, false)?,
        }))
    }

    fn commit(&mut self, batch: WriteBatch) -> Result<()> {
        let tx = self.conn.transaction()?;
        for state in &batch.pools {
            pools::upsert(&tx, state)?;
        }
        for (key, record) in &batch.claims {
            claims::upsert(&tx, key, record)?;
        }
        if let Some(governance) = &batch.governance {
            settings::set(&tx, ADMIN, &governance.admin.to_string())?;
            settings::set(&tx, FUNDING_WALLET, &governance.funding_wallet.to_string())?;
            settings::set(
                &tx,
                CLAIMS_PAUSED,
                if governance.claims_paused { "true" } else { "false" },
            )?;
            settings::set_json(&tx, WEIGHTS, &governance.registry)?;
            settings::set_json(&tx, COLLABORATORS, &governance.collaborators)?;
        }
        tx.commit()?;

        tracing::trace!(
            pools = batch.pools.len(),
            claims = batch.claims.len(),
            governance = batch.governance.is_some(),
            "batch committed"
        );
        Ok(())
    }
}

impl RewardsStore for SqliteStore {
    fn pool_state(&self, pool: &PoolId) -> tidal_rewards::Result<Option<PoolState>> {
        Ok(pools::get(&self.conn, pool)?)
    }

    fn pool_states(&self) -> tidal_rewards::Result<Vec<PoolState>> {
        Ok(pools::list(&self.conn)?)
    }

    fn claim_record(&self, key: &ClaimKey) -> tidal_rewards::Result<Option<ClaimRecord>> {
        Ok(claims::get(&self.conn, key)?)
    }

    fn claim_records_for(
        &self,
        beneficiary: &Beneficiary,
    ) -> tidal_rewards::Result<Vec<(PoolId, ClaimRecord)>> {
        Ok(claims::list_for_beneficiary(&self.conn, beneficiary)?)
    }

    fn governance_state(&self) -> tidal_rewards::Result<Option<GovernanceState>> {
        Ok(self.load_governance()?)
    }

    fn apply(&mut self, batch: WriteBatch) -> tidal_rewards::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        Ok(self.commit(batch)?)
    }
}
