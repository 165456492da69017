use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

use crate::intake::EvidencePolicy;
use crate::services::scan_session::EngineSettings;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DATABASE_URL: &str = "sqlite://returns_intake.db?mode=rwc";
const DEFAULT_SESSION_STORE_DIR: &str = ".returns-intake";
const DEFAULT_SESSION_MAX_AGE_HOURS: u32 = 24;

/// Intake engine configuration with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct IntakeConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "database_url cannot be empty"))]
    pub database_url: String,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// Directory holding the device's session snapshot
    #[serde(default = "default_session_store_dir")]
    pub session_store_dir: String,

    /// Recorded in snapshots so a shared session directory can be traced back
    #[serde(default)]
    pub device_id: Option<String>,

    /// Snapshots older than this are never offered for resume
    #[serde(default = "default_session_max_age_hours")]
    #[validate(range(min = 1, max = 168, message = "session_max_age_hours must be 1-168"))]
    pub session_max_age_hours: u32,

    /// Unset keeps over-quantity scans permissive
    #[serde(default)]
    #[validate(custom = "validate_ceiling_ratio")]
    pub over_quantity_ceiling_ratio: Option<f64>,

    #[serde(default = "default_true_bool")]
    pub require_photo_for_damage: bool,

    #[serde(default = "default_true_bool")]
    pub require_photo_for_missing_parts: bool,

    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl IntakeConfig {
    pub fn new(database_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            db_max_connections: default_db_max_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            session_store_dir: default_session_store_dir(),
            device_id: None,
            session_max_age_hours: DEFAULT_SESSION_MAX_AGE_HOURS,
            over_quantity_ceiling_ratio: None,
            require_photo_for_damage: true,
            require_photo_for_missing_parts: true,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn session_store_path(&self) -> PathBuf {
        PathBuf::from(&self.session_store_dir)
    }

    /// The subset of settings the scan engine consumes.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            session_max_age: chrono::Duration::hours(i64::from(self.session_max_age_hours)),
            over_quantity_ceiling_ratio: self.over_quantity_ceiling_ratio,
            evidence: EvidencePolicy {
                require_photo_for_damage: self.require_photo_for_damage,
                require_photo_for_missing_parts: self.require_photo_for_missing_parts,
            },
            device_id: self.device_id.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    5
}

fn default_db_connect_timeout_secs() -> u64 {
    10
}

fn default_session_store_dir() -> String {
    DEFAULT_SESSION_STORE_DIR.to_string()
}

fn default_session_max_age_hours() -> u32 {
    DEFAULT_SESSION_MAX_AGE_HOURS
}

fn default_true_bool() -> bool {
    true
}

fn default_event_channel_capacity() -> usize {
    256
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_ceiling_ratio(ratio: f64) -> Result<(), ValidationError> {
    if !ratio.is_finite() || ratio < 1.0 {
        let mut err = ValidationError::new("over_quantity_ceiling_ratio");
        err.message = Some("over_quantity_ceiling_ratio must be a finite value >= 1.0".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("returns_intake={},sea_orm=warn", level);
    let filter = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(default_directive));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<IntakeConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

fn profile(config_dir: &Path, name: &str) -> String {
    config_dir.join(name).to_string_lossy().into_owned()
}

pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<IntakeConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&profile(config_dir, "default")).required(false))
        .add_source(File::with_name(&profile(config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let intake_config: IntakeConfig = config.try_deserialize()?;

    intake_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(intake_config)
}
