//! Configuration file management.
//!
//! Read from `$TIDAL_DATA_DIR/config.toml`. Every field has a default, so a
//! missing file or a partial file is valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tidal_emission::EmissionSchedule;
use tidal_types::{
    Address, Amount, TypesError, VaultId, DEFAULT_EPOCH_COUNT, DEFAULT_INITIAL_RATE_PER_EPOCH,
    EPOCH_DURATION_SECS,
};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field}: {source}")]
    Address {
        field: String,
        #[source]
        source: TypesError,
    },

    #[error("emission: {0}")]
    Schedule(#[from] tidal_emission::EmissionError),

    #[error("initial_rate_per_epoch: {0}")]
    Rate(String),
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Emission schedule.
    #[serde(default)]
    pub emission: EmissionConfig,
    /// Initial weights and collaborators.
    #[serde(default)]
    pub weights: WeightsConfig,
    /// Governance settings.
    #[serde(default)]
    pub governance: GovernanceConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Emission schedule configuration. Only read on first launch; the
/// resolved schedule is persisted in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionConfig {
    /// Unix seconds. 0 = time of first launch.
    #[serde(default)]
    pub start: u64,
    /// Unix seconds. 0 = 120 epochs after `start`.
    #[serde(default)]
    pub end: u64,
    #[serde(default = "default_epoch_duration")]
    pub epoch_duration: u64,
    /// Decimal string; amounts exceed TOML's 64-bit integers.
    #[serde(default = "default_initial_rate")]
    pub initial_rate_per_epoch: String,
}

/// Weight configuration applied on first launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_vaults_weight")]
    pub vaults_weight: u64,
    #[serde(default = "default_staking_weight")]
    pub staking_weight: u64,
    /// Vault pools to register.
    #[serde(default)]
    pub vaults: Vec<VaultEntry>,
    /// Staking contract address. Empty = none.
    #[serde(default)]
    pub staking_owner: String,
}

/// One vault pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEntry {
    /// Vault address.
    pub id: String,
    /// Contract allowed to checkpoint the vault.
    pub owner: String,
    #[serde(default)]
    pub weight: u64,
}

/// Governance configuration applied on first launch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Governance address. Empty = administrative calls disabled.
    #[serde(default)]
    pub admin: String,
    /// Wallet that pays claims.
    #[serde(default)]
    pub funding_wallet: String,
    /// Decimal string minted into the funding wallet on first launch.
    #[serde(default)]
    pub funding_balance: String,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log file path. Empty = stderr.
    #[serde(default)]
    pub log_file: String,
    /// Socket file name inside the data directory.
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
}

// Default value functions

fn default_epoch_duration() -> u64 {
    EPOCH_DURATION_SECS
}

fn default_initial_rate() -> String {
    DEFAULT_INITIAL_RATE_PER_EPOCH.to_string()
}

fn default_vaults_weight() -> u64 {
    100
}

fn default_staking_weight() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_socket_name() -> String {
    "tidal.sock".to_string()
}

impl Default for EmissionConfig {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            epoch_duration: default_epoch_duration(),
            initial_rate_per_epoch: default_initial_rate(),
        }
    }
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            vaults_weight: default_vaults_weight(),
            staking_weight: default_staking_weight(),
            vaults: Vec::new(),
            staking_owner: String::new(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            log_level: default_log_level(),
            log_file: String::new(),
            socket_name: default_socket_name(),
        }
    }
}

impl EmissionConfig {
    /// Resolve the schedule, filling `start` with `now` when unset.
    pub fn schedule(&self, now: u64) -> Result<EmissionSchedule, ConfigError> {
        let start = if self.start == 0 { now } else { self.start };
        let end = if self.end == 0 {
            self.epoch_duration
                .checked_mul(DEFAULT_EPOCH_COUNT)
                .and_then(|span| start.checked_add(span))
                .ok_or(tidal_emission::EmissionError::Overflow)?
        } else {
            self.end
        };
        let rate: Amount = self
            .initial_rate_per_epoch
            .parse()
            .map_err(|e| ConfigError::Rate(format!("{e}")))?;
        Ok(EmissionSchedule::new(start, end, self.epoch_duration, rate)?)
    }
}

impl VaultEntry {
    pub fn vault_id(&self) -> Result<VaultId, ConfigError> {
        parse_address("weights.vaults.id", &self.id).map(VaultId)
    }

    pub fn owner_address(&self) -> Result<Address, ConfigError> {
        parse_address("weights.vaults.owner", &self.owner)
    }
}

impl WeightsConfig {
    pub fn staking_owner_address(&self) -> Result<Option<Address>, ConfigError> {
        parse_optional_address("weights.staking_owner", &self.staking_owner)
    }
}

impl GovernanceConfig {
    /// The governance address, or zero when unset.
    pub fn admin_address(&self) -> Result<Address, ConfigError> {
        Ok(parse_optional_address("governance.admin", &self.admin)?.unwrap_or(Address::ZERO))
    }

    pub fn funding_wallet_address(&self) -> Result<Address, ConfigError> {
        Ok(parse_optional_address("governance.funding_wallet", &self.funding_wallet)?
            .unwrap_or(Address::ZERO))
    }

    pub fn initial_funding(&self) -> Result<Amount, ConfigError> {
        if self.funding_balance.is_empty() {
            return Ok(0);
        }
        self.funding_balance
            .parse()
            .map_err(|e| ConfigError::Rate(format!("funding_balance: {e}")))
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address, ConfigError> {
    value.parse().map_err(|source| ConfigError::Address {
        field: field.to_string(),
        source,
    })
}

fn parse_optional_address(field: &str, value: &str) -> Result<Option<Address>, ConfigError> {
    if value.is_empty() {
        return Ok(None);
    }
    parse_address(field, value).map(Some)
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: DaemonConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.advanced.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.advanced.data_dir)
        }
    }

    /// Get the socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join(&self.advanced.socket_name)
    }

    /// Get the config file path.
    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Platform-specific default data directory.
    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("TIDAL_DATA_DIR") {
            return PathBuf::from(dir);
        }
        #[cfg(target_os = "macos")]
        {
            dirs_fallback("Library/Application Support/Tidal")
        }
        #[cfg(not(target_os = "macos"))]
        {
            dirs_fallback(".tidal")
        }
    }
}

/// Fallback home directory resolution.
fn dirs_fallback(subpath: &str) -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(subpath))
        .unwrap_or_else(|_| PathBuf::from("/tmp/tidal"))
}
