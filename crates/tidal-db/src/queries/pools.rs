//! Pool state query functions.

use rusqlite::{Connection, OptionalExtension};
use tidal_rewards::PoolState;
use tidal_types::PoolId;

use crate::{parse_amount, parse_text, Result};

/// A raw `pool_states` row.
type PoolRow = (String, String, i64, String, String, String);

fn decode(row: PoolRow) -> Result<PoolState> {
    let (pool, total_emitted, last_checkpoint_time, numerator, denominator, unattributed) = row;
    Ok(PoolState {
        pool: parse_text("pool", &pool)?,
        total_emitted: parse_amount("total_emitted", &total_emitted)?,
        last_checkpoint_time: last_checkpoint_time as u64,
        weight_numerator: parse_amount("weight_numerator", &numerator)?,
        weight_denominator: parse_amount("weight_denominator", &denominator)?,
        unattributed: parse_amount("unattributed", &unattributed)?,
    })
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PoolRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

/// Get one pool's state.
pub fn get(conn: &Connection, pool: &PoolId) -> Result<Option<PoolState>> {
    let row = conn
        .query_row(
            "SELECT pool, total_emitted, last_checkpoint_time, weight_numerator, weight_denominator,
                    unattributed
             FROM pool_states WHERE pool = ?1",
            [pool.to_string()],
            read_row,
        )
        .optional()?;
    row.map(decode).transpose()
}

/// List every pool state.
pub fn list(conn: &Connection) -> Result<Vec<PoolState>> {
    let mut stmt = conn.prepare(
        "SELECT pool, total_emitted, last_checkpoint_time, weight_numerator, weight_denominator,
                unattributed
         FROM pool_states ORDER BY pool",
    )?;
    let rows = stmt
        .query_map([], read_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(decode).collect()
}

/// Insert or replace a pool state.
pub fn upsert(conn: &Connection, state: &PoolState) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pool_states
         (pool, total_emitted, last_checkpoint_time, weight_numerator, weight_denominator,
          unattributed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            state.pool.to_string(),
            state.total_emitted.to_string(),
            state.last_checkpoint_time as i64,
            state.weight_numerator.to_string(),
            state.weight_denominator.to_string(),
            state.unattributed.to_string(),
        ],
    )?;
    Ok(())
}
