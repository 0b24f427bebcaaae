//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Journal engine tunables.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Posting and numbering policy for journal entries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// How far past "now" a transaction date may lie before posting is refused.
    #[serde(default = "default_future_tolerance_hours")]
    pub future_tolerance_hours: u32,
    /// Transaction dates older than this many days are flagged as backdated.
    #[serde(default = "default_backdate_warning_days")]
    pub backdate_warning_days: u32,
    /// Attempts at inserting a header when the entry number collides.
    #[serde(default = "default_numbering_max_retries")]
    pub numbering_max_retries: u32,
}

fn default_future_tolerance_hours() -> u32 {
    24
}

fn default_backdate_warning_days() -> u32 {
    30
}

fn default_numbering_max_retries() -> u32 {
    3
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            future_tolerance_hours: default_future_tolerance_hours(),
            backdate_warning_days: default_backdate_warning_days(),
            numbering_max_retries: default_numbering_max_retries(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
    /// then `LEDGERBOOK__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("LEDGERBOOK").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
