use anyhow::{Context, Result};
use chrono::Duration;
use config::{Config, Environment, File, FileFormat};
use log::{debug, LevelFilter};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::evaluator::{AlarmPolicy, DEFAULT_DEBOUNCE_HOURS, DEFAULT_OFFLINE_AFTER_HOURS, DEFAULT_THRESHOLD};
use crate::models::Sensor;
use crate::notifier::NotifyMode;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

// one year
const MAX_HOURS: i64 = 24 * 366;
const MAX_FREQUENCY_SECS: u64 = MAX_HOURS as u64 * 3600;

fn default_frequency_secs() -> u64 {
    3600
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_debounce_hours() -> i64 {
    DEFAULT_DEBOUNCE_HOURS
}

fn default_offline_after_hours() -> i64 {
    DEFAULT_OFFLINE_AFTER_HOURS
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_frequency_secs")]
    pub frequency_secs: u64,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_debounce_hours")]
    pub debounce_hours: i64,
    #[serde(default = "default_offline_after_hours")]
    pub offline_after_hours: i64,
    #[serde(default)]
    pub notify: NotifyMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            frequency_secs: default_frequency_secs(),
            threshold: default_threshold(),
            debounce_hours: default_debounce_hours(),
            offline_after_hours: default_offline_after_hours(),
            notify: NotifyMode::default(),
        }
    }
}

fn default_source_url() -> String {
    "https://meetjescraper.online/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    #[serde(default = "default_source_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Alarms keyed by sensor ID in their own file, sensors from this config.
    #[default]
    AlarmFile,
    /// Sensor records with embedded alarms, the file is also the sensor list.
    SensorFile,
    /// Nothing persisted, sensors from this config.
    Memory,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("alarms.json")
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

fn default_smtp_host() -> String {
    "smtp.eu.mailgun.org".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_from() -> String {
    "alert@monitoring.meetjescraper.online".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MailerConfig {
    /// File holding the SMTP password. Without it alerts are only logged.
    #[serde(default)]
    pub secret_path: Option<PathBuf>,
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_from")]
    pub from: String,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            secret_path: None,
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            username: None,
            from: default_from(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SensorConfig {
    pub id: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub threshold: Option<f32>,
    #[serde(default)]
    pub owner: Option<String>,
}

impl From<&SensorConfig> for Sensor {
    fn from(config: &SensorConfig) -> Self {
        Sensor {
            threshold: config.threshold,
            owner: config.owner.clone(),
            ..Sensor::new(config.id.clone(), config.email_address.clone())
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub mailer: MailerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

impl AppConfig {
    pub fn get_log_level(&self) -> LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "trace" => LevelFilter::Trace,
            "debug" => LevelFilter::Debug,
            "info" => LevelFilter::Info,
            "warn" => LevelFilter::Warn,
            "error" => LevelFilter::Error,
            "off" => LevelFilter::Off,
            _ => LevelFilter::Info, // Default to Info if invalid
        }
    }

    /// Loads `path` (YAML) with `SENSORMON__SECTION__KEY` environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_path = path.as_ref();
        debug!("Loading configuration from {}", config_path.display());

        let config = Config::builder()
            .add_source(File::from(config_path).format(FileFormat::Yaml))
            .add_source(Environment::with_prefix("SENSORMON").prefix_separator("__").separator("__"))
            .build()
            .context(format!("Failed to load config from {}", config_path.display()))?;

        let app_config: AppConfig = config.try_deserialize()
            .context("Failed to deserialize config")?;

        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=MAX_FREQUENCY_SECS).contains(&self.monitor.frequency_secs),
            "monitor.frequency_secs must be between 1 and {}", MAX_FREQUENCY_SECS
        );
        anyhow::ensure!(
            (0..=MAX_HOURS).contains(&self.monitor.debounce_hours),
            "monitor.debounce_hours must be between 0 and {}", MAX_HOURS
        );
        anyhow::ensure!(
            (0..=MAX_HOURS).contains(&self.monitor.offline_after_hours),
            "monitor.offline_after_hours must be between 0 and {}", MAX_HOURS
        );
        anyhow::ensure!(self.source.timeout_secs > 0, "source.timeout_secs must be positive");
        if let Some(sensor) = self.sensors.iter().find(|s| s.id.trim().is_empty()) {
            anyhow::bail!("sensor with email {:?} has an empty id", sensor.email_address);
        }
        Ok(())
    }

    pub fn frequency(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.monitor.frequency_secs)
    }

    pub fn policy(&self) -> AlarmPolicy {
        AlarmPolicy {
            debounce: Duration::hours(self.monitor.debounce_hours),
            stale_after: Duration::hours(self.monitor.offline_after_hours),
            default_threshold: self.monitor.threshold,
        }
    }

    pub fn sensors(&self) -> Vec<Sensor> {
        self.sensors.iter().map(Sensor::from).collect()
    }
}
