//! Integration test crate for the Tidal rewards engine.
//!
//! The library only holds shared fixtures; the tests under `tests/`
//! exercise end-to-end flows across the workspace crates with the SQLite
//! store and token ledger underneath.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p tidal-integration-tests
//! ```

use tidal_db::{SqliteStore, SqliteTokenLedger};
use tidal_emission::{EmissionSchedule, EpochClock};
use tidal_rewards::{
    Collaborators, GovernanceState, RewardsDistributor, WeightRegistry, WeightSplit,
};
use tidal_types::{
    Address, Amount, Timestamp, VaultId, DEFAULT_INITIAL_RATE_PER_EPOCH, EPOCH_DURATION_SECS,
};

/// Base timestamp for test scenarios.
pub const BASE_TIME: Timestamp = 1_700_000_000;

/// One epoch, roughly a month.
pub const MONTH: Timestamp = EPOCH_DURATION_SECS;

/// Funding wallet balance minted by [`Harness::new`].
pub const FUNDING: Amount = 1_000_000_000_000_000_000_000_000;

pub fn admin() -> Address {
    Address::repeat(0xad)
}

pub fn funding_wallet() -> Address {
    Address::repeat(0xf0)
}

pub fn staking_owner() -> Address {
    Address::repeat(0x5a)
}

/// The `n`-th test vault.
pub fn vault(n: u8) -> VaultId {
    VaultId(Address::repeat(n))
}

/// The contract allowed to checkpoint [`vault`]`(n)`.
pub fn vault_owner(n: u8) -> Address {
    Address::repeat(0x80 | n)
}

/// A schedule with the production rate table between `start` and `end`.
pub fn schedule(start: Timestamp, end: Timestamp) -> EmissionSchedule {
    EmissionSchedule::new(start, end, EPOCH_DURATION_SECS, DEFAULT_INITIAL_RATE_PER_EPOCH)
        .expect("valid schedule")
}

/// A distributor over an in-memory SQLite database plus a funded ledger.
pub struct Harness {
    pub distributor: RewardsDistributor<SqliteStore>,
    pub tokens: SqliteTokenLedger,
}

impl Harness {
    /// Register vaults `1..=vault_weights.len()` with the given weights,
    /// set the staking owner and fund the wallet.
    pub fn new(schedule: EmissionSchedule, split: (u64, u64), vault_weights: &[u64]) -> Self {
        let store = SqliteStore::open_memory().expect("open store");
        Self::with_store(schedule, store, split, vault_weights)
    }

    pub fn with_store(
        schedule: EmissionSchedule,
        store: SqliteStore,
        split: (u64, u64),
        vault_weights: &[u64],
    ) -> Self {
        let mut collaborators = Collaborators::new();
        let vaults: Vec<VaultId> = (1..=vault_weights.len() as u8).map(vault).collect();
        for (n, id) in vaults.iter().enumerate() {
            collaborators.register_vault(*id, vault_owner(n as u8 + 1));
        }
        collaborators.set_staking_owner(staking_owner());

        let initial = GovernanceState {
            admin: admin(),
            registry: WeightRegistry::new(WeightSplit::new(split.0, split.1).expect("split")),
            collaborators,
            funding_wallet: funding_wallet(),
            claims_paused: false,
        };
        let clock = EpochClock::new(schedule).expect("clock");
        let mut distributor = RewardsDistributor::open(clock, store, initial).expect("open");
        if !vaults.is_empty() {
            distributor
                .set_vault_weights(&admin(), &vaults, vault_weights, schedule.start)
                .expect("vault weights");
        }
        distributor.drain_events();

        let mut tokens = SqliteTokenLedger::open_memory().expect("open ledger");
        tokens.mint(&funding_wallet(), FUNDING).expect("mint");
        Self { distributor, tokens }
    }

    /// Emission over `[from, to)` under this harness's schedule.
    pub fn emission(&self, from: Timestamp, to: Timestamp) -> Amount {
        self.distributor
            .engine()
            .clock()
            .emission_between(from, to)
            .expect("emission")
    }
}
