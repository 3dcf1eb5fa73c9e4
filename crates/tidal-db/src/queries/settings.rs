//! Settings query functions.

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{DbError, Result};

/// Get a setting value by key.
pub fn get(conn: &Connection, key: &str) -> Result<String> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => {
            DbError::NotFound(format!("setting '{key}'"))
        }
        other => DbError::Sqlite(other),
    })
}

/// Set a setting value.
pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        rusqlite::params![key, value],
    )?;
    Ok(())
}

/// Get a setting as a boolean, defaulting to `default` if not found.
pub fn get_bool(conn: &Connection, key: &str, default: bool) -> Result<bool> {
    match get(conn, key) {
        Ok(v) => Ok(v == "true" || v == "1"),
        Err(DbError::NotFound(_)) => Ok(default),
        Err(e) => Err(e),
    }
}

/// Get a JSON-encoded setting, or `None` if not found.
pub fn get_json<T: DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    match get(conn, key) {
        Ok(v) => serde_json::from_str(&v)
            .map(Some)
            .map_err(|e| DbError::Serialization(format!("setting '{key}': {e}"))),
        Err(DbError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Store a setting as JSON.
pub fn set_json<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let encoded = serde_json::to_string(value)
        .map_err(|e| DbError::Serialization(format!("setting '{key}': {e}")))?;
    set(conn, key, &encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Connection {
        crate::open_memory().expect("open test db")
    }

    #[test]
    fn test_get_default_setting() {
        let conn = test_db();
        assert_eq!(get(&conn, "claims_paused").expect("get"), "false");
    }

    #[test]
    fn test_get_nonexistent() {
        let conn = test_db();
        let result = get(&conn, "nonexistent");
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_get_bool() {
        let conn = test_db();
        assert!(!get_bool(&conn, "claims_paused", true).expect("get"));
        set(&conn, "claims_paused", "true").expect("set");
        assert!(get_bool(&conn, "claims_paused", false).expect("get"));
        assert!(get_bool(&conn, "missing", true).expect("default"));
    }

    #[test]
    fn test_json_round_trip() {
        let conn = test_db();
        assert_eq!(get_json::<Vec<u64>>(&conn, "weights").expect("missing"), None);
        set_json(&conn, "weights", &vec![100u64, 50]).expect("set");
        assert_eq!(
            get_json::<Vec<u64>>(&conn, "weights").expect("get"),
            Some(vec![100, 50])
        );

        set(&conn, "weights", "not json").expect("set");
        assert!(matches!(
            get_json::<Vec<u64>>(&conn, "weights"),
            Err(DbError::Serialization(_))
        ));
    }
}
