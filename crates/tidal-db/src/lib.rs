//! # tidal-db
//!
//! SQLite persistence for the Tidal rewards daemon.
//! Manages the single database at `$TIDAL_DATA_DIR/tidal.db`.
//!
//! ## Schema
//!
//! - WAL mode mandatory
//! - Amounts are stored as decimal TEXT (they exceed SQLite's 64-bit integers)
//! - Pool ids, beneficiaries and addresses are stored in their text form
//! - All timestamps are Unix epoch seconds
//! - Schema version stored in `PRAGMA user_version`
//!
//! ## Modules
//!
//! - [`schema`] — Table definitions
//! - [`migrations`] — Forward-only migrations
//! - [`queries`] — Query functions per table
//! - [`store`] — [`SqliteStore`], the durable `RewardsStore`
//! - [`ledger`] — [`SqliteTokenLedger`], the funding-wallet token ledger

pub mod ledger;
pub mod migrations;
pub mod queries;
pub mod schema;
pub mod store;

pub use ledger::SqliteTokenLedger;
pub use store::SqliteStore;

use rusqlite::Connection;
use std::path::Path;
use tidal_rewards::RewardsError;
use tidal_types::Amount;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for RewardsError {
    fn from(err: DbError) -> Self {
        RewardsError::Store(err.to_string())
    }
}

/// Open or create the Tidal database at the given path.
///
/// Configures WAL mode and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -8000;",
    )?;
    Ok(())
}

/// Parse a decimal TEXT amount column.
pub(crate) fn parse_amount(column: &str, value: &str) -> Result<Amount> {
    value
        .parse()
        .map_err(|e| DbError::Serialization(format!("{column} '{value}': {e}")))
}

/// Parse any text column through `FromStr`.
pub(crate) fn parse_text<T>(column: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| DbError::Serialization(format!("{column} '{value}': {e}")))
}
