//! Funding-wallet token ledger in SQLite.

use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use tidal_rewards::{RewardsError, TokenTransfer};
use tidal_types::{Address, Amount, Timestamp};

use crate::queries::{tokens, transfers};
use crate::Result;

/// [`TokenTransfer`] over the `token_balances` table. Every transfer is
/// appended to `reward_transfers`.
pub struct SqliteTokenLedger {
    conn: Connection,
}

impl SqliteTokenLedger {
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn open(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(crate::open(path)?))
    }

    pub fn open_memory() -> Result<Self> {
        Ok(Self::new(crate::open_memory()?))
    }

    /// Credit `amount` to `to`.
    pub fn mint(&mut self, to: &Address, amount: Amount) -> Result<()> {
        let tx = self.conn.transaction()?;
        let balance = tokens::balance(&tx, to)?;
        let credited = balance.checked_add(amount).ok_or_else(|| {
            crate::DbError::Constraint(format!("balance of {to} overflows"))
        })?;
        tokens::set_balance(&tx, to, credited)?;
        tx.commit()?;
        tracing::info!(%to, amount = %amount, "tokens minted");
        Ok(())
    }

    /// Most recent transfers first.
    pub fn recent_transfers(&self, limit: u32) -> Result<Vec<transfers::TransferRow>> {
        transfers::recent(&self.conn, limit)
    }

    fn move_tokens(&mut self, from: &Address, to: &Address, amount: Amount) -> tidal_rewards::Result<()> {
        let tx = self.conn.transaction().map_err(crate::DbError::from)?;
        let available = tokens::balance(&tx, from)?;
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            RewardsError::Transfer(format!("{from} holds {available}, cannot send {amount}"))
        })?;
        tokens::set_balance(&tx, from, remaining)?;
        let received = tokens::balance(&tx, to)?
            .checked_add(amount)
            .ok_or(RewardsError::ArithmeticOverflow)?;
        tokens::set_balance(&tx, to, received)?;
        transfers::record(&tx, from, to, amount, unix_now())?;
        tx.commit().map_err(crate::DbError::from)?;
        Ok(())
    }
}

impl TokenTransfer for SqliteTokenLedger {
    fn transfer_from(&mut self, from: &Address, to: &Address, amount: Amount) -> tidal_rewards::Result<()> {
        self.move_tokens(from, to, amount)
    }

    fn balance_of(&self, owner: &Address) -> tidal_rewards::Result<Amount> {
        Ok(tokens::balance(&self.conn, owner)?)
    }
}

fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_balance_and_records() {
        let mut ledger = SqliteTokenLedger::open_memory().expect("open");
        let wallet = Address::repeat(0xf0);
        let alice = Address::repeat(0x0a);
        ledger.mint(&wallet, 1_000).expect("mint");

        ledger.transfer_from(&wallet, &alice, 400).expect("transfer");
        assert_eq!(ledger.balance_of(&wallet).expect("wallet"), 600);
        assert_eq!(ledger.balance_of(&alice).expect("alice"), 400);

        let history = ledger.recent_transfers(5).expect("history");
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].from, wallet);
        assert_eq!(history[0].amount, 400);
    }

    #[test]
    fn test_overdraft_leaves_balances() {
        let mut ledger = SqliteTokenLedger::open_memory().expect("open");
        let wallet = Address::repeat(0xf0);
        let alice = Address::repeat(0x0a);
        ledger.mint(&wallet, 10).expect("mint");

        let err = ledger
            .transfer_from(&wallet, &alice, 11)
            .expect_err("overdraft");
        assert!(matches!(err, RewardsError::Transfer(_)));
        assert_eq!(ledger.balance_of(&wallet).expect("wallet"), 10);
        assert_eq!(ledger.balance_of(&alice).expect("alice"), 0);
        assert!(ledger.recent_transfers(5).expect("history").is_empty());
    }
}
