//! Configuration for the index system.
//!
//! Layered settings: defaults, then `symdex.toml`, then environment
//! variables. Environment variables are prefixed with `SYMDEX_` and use
//! double underscores for nesting:
//!
//! - `SYMDEX_STORE_PATH=/build/index-store`
//! - `SYMDEX_READONLY=true`
//! - `SYMDEX_LOGGING__DEFAULT=debug`

use std::collections::HashMap;
use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::IndexError;
use crate::system::SystemOptions;

pub const CONFIG_FILE_NAME: &str = "symdex.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Directory the compiler writes unit artifacts into.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Directory for the index database.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Only explicitly added unit output paths are visible.
    #[serde(default)]
    pub use_explicit_output_units: bool,

    #[serde(default)]
    pub readonly: bool,

    /// Report stale units against file modification times while polling.
    #[serde(default)]
    pub enable_out_of_date_file_watching: bool,

    #[serde(default = "default_true")]
    pub listen_to_unit_events: bool,

    #[serde(default = "default_true")]
    pub wait_until_done_initializing: bool,

    /// Capacity hint for the occurrence tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_db_size: Option<usize>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides, e.g. `datastore = "debug"`.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            database_path: default_database_path(),
            use_explicit_output_units: false,
            readonly: false,
            enable_out_of_date_file_watching: false,
            listen_to_unit_events: true,
            wait_until_done_initializing: true,
            initial_db_size: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `symdex.toml` and the environment.
    pub fn load() -> Result<Self, IndexError> {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(CONFIG_FILE_NAME))
            .merge(Env::prefixed("SYMDEX_").split("__"))
            .extract()
            .map_err(|e| IndexError::Config {
                reason: e.to_string(),
            })
    }

    /// The construction flags these settings describe.
    pub fn system_options(&self) -> SystemOptions {
        SystemOptions {
            use_explicit_output_units: self.use_explicit_output_units,
            readonly: self.readonly,
            enable_out_of_date_file_watching: self.enable_out_of_date_file_watching,
            listen_to_unit_events: self.listen_to_unit_events,
            wait_until_done_initializing: self.wait_until_done_initializing,
            initial_db_size: self.initial_db_size,
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".symdex/store")
}

fn default_database_path() -> PathBuf {
    PathBuf::from(".symdex/db")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".to_string()
}
