//! Reward transfer history.

use rusqlite::Connection;
use tidal_types::{Address, Amount, Timestamp};

use crate::{parse_amount, parse_text, Result};

/// A recorded transfer out of the funding wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRow {
    pub sequence: u64,
    pub transfer_id: [u8; 32],
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub recorded_at: Timestamp,
}

/// Deterministic transfer id: BLAKE3 over sequence, parties and amount.
pub fn transfer_id(sequence: u64, from: &Address, to: &Address, amount: Amount) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&sequence.to_le_bytes());
    hasher.update(&from.0);
    hasher.update(&to.0);
    hasher.update(&amount.to_le_bytes());
    *hasher.finalize().as_bytes()
}

/// Append a transfer and return its id.
pub fn record(
    conn: &Connection,
    from: &Address,
    to: &Address,
    amount: Amount,
    recorded_at: Timestamp,
) -> Result<[u8; 32]> {
    let next: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sequence), 0) + 1 FROM reward_transfers",
        [],
        |row| row.get(0),
    )?;
    let id = transfer_id(next as u64, from, to, amount);
    conn.execute(
        "INSERT INTO reward_transfers (sequence, transfer_id, from_address, to_address, amount, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            next,
            id.as_slice(),
            from.to_string(),
            to.to_string(),
            amount.to_string(),
            recorded_at as i64,
        ],
    )?;
    Ok(id)
}

/// Most recent transfers first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<TransferRow>> {
    let mut stmt = conn.prepare(
        "SELECT sequence, transfer_id, from_address, to_address, amount, recorded_at
         FROM reward_transfers ORDER BY sequence DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(sequence, id, from, to, amount, recorded_at)| {
            let transfer_id: [u8; 32] = id.as_slice().try_into().map_err(|_| {
                crate::DbError::Serialization(format!("transfer_id has {} bytes", id.len()))
            })?;
            Ok(TransferRow {
                sequence: sequence as u64,
                transfer_id,
                from: parse_text("from_address", &from)?,
                to: parse_text("to_address", &to)?,
                amount: parse_amount("amount", &amount)?,
                recorded_at: recorded_at as u64,
            })
        })
        .collect()
}
