//! Claim record query functions.

use rusqlite::{Connection, OptionalExtension};
use tidal_rewards::{ClaimKey, ClaimRecord};
use tidal_types::{Beneficiary, PoolId};

use crate::{parse_amount, parse_text, Result};

/// Get one claim record.
pub fn get(conn: &Connection, key: &ClaimKey) -> Result<Option<ClaimRecord>> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT total_available, total_claimed FROM claim_records
             WHERE pool = ?1 AND beneficiary = ?2",
            [key.pool.to_string(), key.beneficiary.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    row.map(|(available, claimed)| {
        Ok(ClaimRecord {
            total_available: parse_amount("total_available", &available)?,
            total_claimed: parse_amount("total_claimed", &claimed)?,
        })
    })
    .transpose()
}

/// List every record of one beneficiary, ordered by pool.
pub fn list_for_beneficiary(
    conn: &Connection,
    beneficiary: &Beneficiary,
) -> Result<Vec<(PoolId, ClaimRecord)>> {
    let mut stmt = conn.prepare(
        "SELECT pool, total_available, total_claimed FROM claim_records
         WHERE beneficiary = ?1 ORDER BY pool",
    )?;
    let rows = stmt
        .query_map([beneficiary.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(pool, available, claimed)| {
            Ok((
                parse_text("pool", &pool)?,
                ClaimRecord {
                    total_available: parse_amount("total_available", &available)?,
                    total_claimed: parse_amount("total_claimed", &claimed)?,
                },
            ))
        })
        .collect()
}

/// Insert or replace a claim record.
pub fn upsert(conn: &Connection, key: &ClaimKey, record: &ClaimRecord) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO claim_records
         (pool, beneficiary, total_available, total_claimed)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            key.pool.to_string(),
            key.beneficiary.to_string(),
            record.total_available.to_string(),
            record.total_claimed.to_string(),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidal_types::{Address, StakeId, VaultId};

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = test_db();
        let key = ClaimKey::new(PoolId::Staking, Beneficiary::Stake(StakeId(12)));
        assert!(get(&conn, &key).expect("get").is_none());

        let record = ClaimRecord {
            total_available: 1_000_000_000_000_000_000_000,
            total_claimed: 400,
        };
        upsert(&conn, &key, &record).expect("upsert");
        assert_eq!(get(&conn, &key).expect("get"), Some(record));
    }

    #[test]
    fn test_list_for_beneficiary() {
        let conn = test_db();
        let alice = Beneficiary::Depositor(Address::repeat(0x0a));
        let bob = Beneficiary::Depositor(Address::repeat(0x0b));
        let v1 = PoolId::Vault(VaultId(Address::repeat(1)));
        let v2 = PoolId::Vault(VaultId(Address::repeat(2)));
        let record = ClaimRecord {
            total_available: 5,
            total_claimed: 0,
        };
        upsert(&conn, &ClaimKey::new(v2, alice), &record).expect("a2");
        upsert(&conn, &ClaimKey::new(v1, alice), &record).expect("a1");
        upsert(&conn, &ClaimKey::new(v1, bob), &record).expect("b1");

        let listed = list_for_beneficiary(&conn, &alice).expect("list");
        assert_eq!(listed, vec![(v1, record), (v2, record)]);
    }
}
