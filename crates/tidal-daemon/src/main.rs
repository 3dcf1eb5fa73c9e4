//! tidal-daemon: the Tidal rewards daemon.
//!
//! Single OS process running a Tokio async runtime. Vault and staking
//! collaborators, claimants and governance reach the rewards engine through
//! JSON-RPC over a Unix socket. All mutating calls are serialised behind one
//! lock around the distributor.

mod commands;
mod config;
mod events;
mod rpc;

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tidal_db::queries::settings;
use tidal_db::{SqliteStore, SqliteTokenLedger};
use tidal_emission::{EmissionSchedule, EpochClock};
use tidal_rewards::{Collaborators, GovernanceState, RewardsDistributor, ShareBook, WeightRegistry, WeightSplit};
use tidal_types::events::{Event, EventType};
use tidal_types::{Amount, VaultId};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::events::EventBus;
use crate::rpc::RpcServer;

/// Settings key holding the resolved emission schedule.
const EMISSION_SCHEDULE: &str = "emission_schedule";

/// Everything guarded by the daemon lock.
pub struct Rewards {
    pub distributor: RewardsDistributor<SqliteStore>,
    /// Share balances reported by the collaborators.
    pub shares: ShareBook,
    /// Funding-wallet token ledger.
    pub tokens: SqliteTokenLedger,
}

/// Daemon-wide shared state.
pub struct DaemonState {
    /// Rewards engine and its collaborators.
    pub rewards: Mutex<Rewards>,
    /// Configuration.
    pub config: DaemonConfig,
    /// Event bus for pushing events to subscribers.
    pub event_bus: EventBus,
    /// Shutdown signal sender.
    pub shutdown_tx: broadcast::Sender<()>,
}

impl DaemonState {
    /// Open the databases under `data_dir`.
    pub fn open(config: &DaemonConfig, data_dir: &Path) -> anyhow::Result<Self> {
        let db_path = data_dir.join("tidal.db");
        let store = SqliteStore::open(&db_path)?;
        let tokens = SqliteTokenLedger::open(&db_path)?;
        Self::build(config, store, tokens)
    }

    /// In-memory state (for testing).
    pub fn in_memory(config: &DaemonConfig) -> anyhow::Result<Self> {
        Self::build(
            config,
            SqliteStore::open_memory()?,
            SqliteTokenLedger::open_memory()?,
        )
    }

    fn build(
        config: &DaemonConfig,
        store: SqliteStore,
        mut tokens: SqliteTokenLedger,
    ) -> anyhow::Result<Self> {
        use tidal_rewards::RewardsStore;

        let schedule = resolve_schedule(config, &store)?;
        let clock = EpochClock::new(schedule)?;
        let first_launch = store.governance_state()?.is_none();

        let initial = initial_governance(config)?;
        let mut distributor = RewardsDistributor::open(clock, store, initial)?;

        if first_launch {
            seed(config, &mut distributor, &mut tokens, schedule.start)?;
        }
        // Seeding emits configuration events nobody is subscribed to yet.
        distributor.drain_events();

        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            rewards: Mutex::new(Rewards {
                distributor,
                shares: ShareBook::new(),
                tokens,
            }),
            config: config.clone(),
            event_bus: EventBus::new(1000),
            shutdown_tx,
        })
    }
}

/// The persisted schedule wins over the configured one.
fn resolve_schedule(config: &DaemonConfig, store: &SqliteStore) -> anyhow::Result<EmissionSchedule> {
    let conn = store.connection();
    if let Some(persisted) = settings::get_json::<EmissionSchedule>(conn, EMISSION_SCHEDULE)? {
        persisted.validate()?;
        let configured = config.emission.schedule(persisted.start)?;
        if configured != persisted {
            warn!("emission config differs from the persisted schedule; keeping the persisted one");
        }
        return Ok(persisted);
    }
    let schedule = config.emission.schedule(unix_now())?;
    settings::set_json(conn, EMISSION_SCHEDULE, &schedule)?;
    info!(
        start = schedule.start,
        end = schedule.end,
        epochs = schedule.epoch_count(),
        "emission schedule initialised"
    );
    Ok(schedule)
}

/// Governance state for a fresh database. Vault weights are applied by
/// [`seed`] because they need the registered vaults.
fn initial_governance(config: &DaemonConfig) -> anyhow::Result<GovernanceState> {
    let split = WeightSplit::new(config.weights.vaults_weight, config.weights.staking_weight)?;
    let mut collaborators = Collaborators::new();
    for entry in &config.weights.vaults {
        collaborators.register_vault(entry.vault_id()?, entry.owner_address()?);
    }
    if let Some(owner) = config.weights.staking_owner_address()? {
        collaborators.set_staking_owner(owner);
    }

    let admin = config.governance.admin_address()?;
    if admin.is_zero() {
        warn!("governance.admin is unset; administrative calls are disabled");
    }
    Ok(GovernanceState {
        admin,
        registry: WeightRegistry::new(split),
        collaborators,
        funding_wallet: config.governance.funding_wallet_address()?,
        claims_paused: false,
    })
}

/// Apply configured vault weights and fund the wallet on first launch.
fn seed(
    config: &DaemonConfig,
    distributor: &mut RewardsDistributor<SqliteStore>,
    tokens: &mut SqliteTokenLedger,
    start: u64,
) -> anyhow::Result<()> {
    let admin = distributor.admin();
    let vaults: Vec<VaultId> = config
        .weights
        .vaults
        .iter()
        .map(|entry| entry.vault_id())
        .collect::<Result<_, _>>()?;
    let weights: Vec<u64> = config.weights.vaults.iter().map(|entry| entry.weight).collect();
    if !vaults.is_empty() {
        if admin.is_zero() {
            warn!("vault weights need governance.admin; all vaults start at weight 0");
        } else {
            distributor.set_vault_weights(&admin, &vaults, &weights, start)?;
        }
    }

    let funding: Amount = config.governance.initial_funding()?;
    if funding > 0 {
        tokens.mint(&distributor.funding_wallet(), funding)?;
    }
    Ok(())
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing(config: &DaemonConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("tidal={}", config.advanced.log_level).parse()?);
    if config.advanced.log_file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.advanced.log_file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    // 2. Initialize tracing
    init_tracing(&config)?;
    info!("Tidal daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // 3. Open database and build state
    let state = Arc::new(DaemonState::open(&config, &data_dir)?);

    // 4. Start IPC server
    let socket_path = config.socket_path();
    let rpc_server = RpcServer::new(state.clone(), socket_path.clone());

    info!("Starting JSON-RPC server on {:?}", socket_path);

    // 5. Emit DaemonStarted event
    state.event_bus.emit(Event {
        event_type: EventType::DaemonStarted,
        timestamp: unix_now(),
        payload: serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    });

    // 6. Run the RPC server until shutdown
    let mut shutdown_rx = state.shutdown_tx.subscribe();
    tokio::select! {
        result = rpc_server.run() => {
            if let Err(e) = result {
                error!("RPC server error: {}", e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
        }
    }

    info!("Daemon shutting down gracefully");
    let _ = std::fs::remove_file(&socket_path);
    info!("Daemon stopped");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::VaultEntry;
    use tidal_rewards::TokenTransfer;
    use tidal_types::{Address, PoolId};

    pub(crate) const START: u64 = 1_700_000_000;

    pub(crate) fn admin() -> Address {
        Address::repeat(0xad)
    }

    pub(crate) fn vault() -> VaultId {
        VaultId(Address::repeat(0x01))
    }

    pub(crate) fn vault_owner() -> Address {
        Address::repeat(0x03)
    }

    pub(crate) fn staking_owner() -> Address {
        Address::repeat(0x02)
    }

    pub(crate) fn funding() -> Address {
        Address::repeat(0xf0)
    }

    /// One vault of weight 100, split 100/50, funded wallet.
    pub(crate) fn config() -> DaemonConfig {
        let mut config = DaemonConfig::default();
        config.emission.start = START;
        config.weights.vaults = vec![VaultEntry {
            id: vault().to_string(),
            owner: vault_owner().to_string(),
            weight: 100,
        }];
        config.weights.staking_owner = staking_owner().to_string();
        config.governance.admin = admin().to_string();
        config.governance.funding_wallet = funding().to_string();
        config.governance.funding_balance = "1000000000000000000000".to_string();
        config
    }

    #[tokio::test]
    async fn test_in_memory_state_is_seeded() {
        let state = DaemonState::in_memory(&config()).expect("state");
        let rewards = state.rewards.lock().await;
        let distributor = &rewards.distributor;

        assert_eq!(distributor.admin(), admin());
        assert_eq!(distributor.schedule().start, START);
        assert!(distributor.collaborators().is_vault(&vault()));
        assert_eq!(distributor.registry().vault_weight(&vault()), 100);
        assert_eq!(
            distributor.collaborators().owner_of(&PoolId::Staking),
            Some(staking_owner())
        );
        assert_eq!(
            rewards.tokens.balance_of(&funding()).expect("balance"),
            1_000_000_000_000_000_000_000
        );
    }

    #[test]
    fn test_reopen_keeps_schedule_and_funding() {
        let dir = std::env::temp_dir().join(format!("tidal-daemon-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let _ = std::fs::remove_file(dir.join("tidal.db"));

        let mut cfg = config();
        cfg.emission.start = 0;
        let first_start = {
            let state = DaemonState::open(&cfg, &dir).expect("first open");
            let rewards = state.rewards.blocking_lock();
            rewards.distributor.schedule().start
        };

        let state = DaemonState::open(&cfg, &dir).expect("second open");
        let rewards = state.rewards.blocking_lock();
        assert_eq!(rewards.distributor.schedule().start, first_start);
        assert_eq!(
            rewards.tokens.balance_of(&funding()).expect("balance"),
            1_000_000_000_000_000_000_000
        );
        drop(rewards);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
