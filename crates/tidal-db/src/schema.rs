//! SQL schema definitions.

/// Complete schema for the v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Accrual
-- ============================================================

CREATE TABLE IF NOT EXISTS pool_states (
    pool TEXT PRIMARY KEY,
    total_emitted TEXT NOT NULL,
    last_checkpoint_time INTEGER NOT NULL,
    weight_numerator TEXT NOT NULL,
    weight_denominator TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS claim_records (
    pool TEXT NOT NULL,
    beneficiary TEXT NOT NULL,
    total_available TEXT NOT NULL,
    total_claimed TEXT NOT NULL,
    PRIMARY KEY (pool, beneficiary)
);

CREATE INDEX IF NOT EXISTS idx_claim_records_beneficiary ON claim_records(beneficiary);

-- ============================================================
-- Governance
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- ============================================================
-- Funding wallet
-- ============================================================

CREATE TABLE IF NOT EXISTS token_balances (
    address TEXT PRIMARY KEY,
    balance TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reward_transfers (
    sequence INTEGER PRIMARY KEY AUTOINCREMENT,
    transfer_id BLOB NOT NULL UNIQUE,
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    amount TEXT NOT NULL,
    recorded_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reward_transfers_to ON reward_transfers(to_address);
"#;

/// v2: reweight deltas carried until the next beneficiary checkpoint.
pub const MIGRATION_V2: &str = r#"
ALTER TABLE pool_states ADD COLUMN unattributed TEXT NOT NULL DEFAULT '0';
"#;
