//! Token balance query functions.

use rusqlite::{Connection, OptionalExtension};
use tidal_types::{Address, Amount};

use crate::{parse_amount, Result};

/// Balance of `address`; zero if it has never held tokens.
pub fn balance(conn: &Connection, address: &Address) -> Result<Amount> {
    let value: Option<String> = conn
        .query_row(
            "SELECT balance FROM token_balances WHERE address = ?1",
            [address.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match value {
        Some(value) => parse_amount("balance", &value),
        None => Ok(0),
    }
}

/// Overwrite the balance of `address`.
pub fn set_balance(conn: &Connection, address: &Address, amount: Amount) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO token_balances (address, balance) VALUES (?1, ?2)",
        rusqlite::params![address.to_string(), amount.to_string()],
    )?;
    Ok(())
}
