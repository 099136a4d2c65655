//! Runtime settings for the SPOTER encoder.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::spoter::architectures::encoder::DEFAULT_MASK_RATIO;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Seed for parameter initialisation and mask selection.
    pub seed: u64,

    /// Fraction of valid frames masked per sequence.
    pub mask_ratio: f64,

    /// Optional JSON file holding an `EncoderConfig`.
    /// When unset, the built-in defaults are used.
    pub model_config_path: Option<PathBuf>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            seed: 0,
            mask_ratio: DEFAULT_MASK_RATIO,
            model_config_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub runtime: RuntimeSettings,
}

impl Settings {
    /// Load settings from an optional `spoter.{toml,json,yaml}` file and
    /// environment variables prefixed with `SPOTER_` (nested keys use `__`,
    /// e.g. `SPOTER_RUNTIME__SEED=7`).
    pub fn new() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name("spoter").required(false))
            .add_source(Environment::with_prefix("SPOTER").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load settings from an explicit file, ignoring the environment.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name(path))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("runtime.seed", 0_i64)?
            .set_default("runtime.mask_ratio", DEFAULT_MASK_RATIO)?
            .set_default("runtime.model_config_path", None::<String>)
    }
}

static SETTINGS: OnceLock<Settings> = OnceLock::new();

/// Get the global settings instance, initializing it if necessary.
pub fn settings() -> &'static Settings {
    SETTINGS.get_or_init(|| Settings::new().unwrap_or_else(|_| Settings::default()))
}
