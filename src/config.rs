//! Configuration loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (`AIRDROP_` prefix, `__` between sections)
//!
//! Example: `AIRDROP_SEQUENCER__CONFIRMATIONS=2` -> `sequencer.confirmations`

use crate::chain::{default_chains, ChainEntry, ChainRegistry};
use crate::{Error, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable prefix for config overrides
const ENV_PREFIX: &str = "AIRDROP_";

const DEFAULT_CONFIRMATIONS: u64 = 1;
const DEFAULT_SIGNATURE_TIMEOUT_MS: u64 = 300_000;
const DEFAULT_INCLUSION_TIMEOUT_MS: u64 = 600_000;
const DEFAULT_MAX_TRACKED_TRANSACTIONS: usize = crate::lifecycle::DEFAULT_MAX_TRACKED;
const DEFAULT_LOG_FILTER: &str = "info";

/// Sequencer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Confirmations to wait for on each transaction
    pub confirmations: u64,

    /// How long a wallet prompt may stay unanswered (milliseconds)
    pub signature_timeout_ms: u64,

    /// How long to wait for inclusion after broadcast (milliseconds)
    pub inclusion_timeout_ms: u64,

    /// Broadcast transactions kept in the tracker before old finalized ones are evicted
    pub max_tracked_transactions: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            confirmations: DEFAULT_CONFIRMATIONS,
            signature_timeout_ms: DEFAULT_SIGNATURE_TIMEOUT_MS,
            inclusion_timeout_ms: DEFAULT_INCLUSION_TIMEOUT_MS,
            max_tracked_transactions: DEFAULT_MAX_TRACKED_TRANSACTIONS,
        }
    }
}

impl SequencerConfig {
    pub fn signature_timeout(&self) -> Duration {
        Duration::from_millis(self.signature_timeout_ms)
    }

    pub fn inclusion_timeout(&self) -> Duration {
        Duration::from_millis(self.inclusion_timeout_ms)
    }
}

/// Where the draft is persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DraftConfig {
    /// JSON file for the draft; in-memory only when unset
    pub path: Option<PathBuf>,
}

/// Log filter configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sequencer: SequencerConfig,
    pub chains: Vec<ChainEntry>,
    pub draft: DraftConfig,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sequencer: SequencerConfig::default(),
            chains: default_chains(),
            draft: DraftConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Chain table as a lookup registry
    pub fn chain_registry(&self) -> ChainRegistry {
        ChainRegistry::from_entries(self.chains.iter().cloned())
    }

    /// Reject values the sequencer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.sequencer.confirmations == 0 {
            return Err(Error::Config(
                "sequencer.confirmations must be at least 1".to_string(),
            ));
        }
        if self.sequencer.signature_timeout_ms == 0 || self.sequencer.inclusion_timeout_ms == 0 {
            return Err(Error::Config(
                "sequencer timeouts must be non-zero".to_string(),
            ));
        }
        if self.sequencer.max_tracked_transactions == 0 {
            return Err(Error::Config(
                "sequencer.max_tracked_transactions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from defaults, an optional TOML file and the environment
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        debug!("Loading config file {}", path.display());
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment
        .extract()
        .map_err(|e| Error::Config(e.to_string()))?;
    config.validate()?;

    info!(
        "Loaded config: {} chains, {} confirmation(s)",
        config.chains.len(),
        config.sequencer.confirmations
    );
    Ok(config)
}
