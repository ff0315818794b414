use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::checker::{CheckCycle, CheckError, CycleSummary};
use crate::collectors::{HttpReadingSource, ReadingSource};
use crate::config::{AppConfig, StorageBackend};
use crate::evaluator::AlarmPolicy;
use crate::notifier::{self, Notifier, NotifyMode};
use crate::storage::{AlarmFile, AlarmStore, ConfiguredSensors, MemoryAlarmStore, SensorFile, SensorRegistry};

/// The collaborators of the check cycle, wired from one configuration.
pub struct Monitor {
    sensors: Arc<dyn SensorRegistry>,
    alarms: Arc<dyn AlarmStore>,
    readings: Arc<dyn ReadingSource>,
    notifier: Arc<dyn Notifier>,
    policy: AlarmPolicy,
    notify_mode: NotifyMode,
    sender: String,
}

fn build_storage(config: &AppConfig) -> (Arc<dyn SensorRegistry>, Arc<dyn AlarmStore>) {
    match config.storage.backend {
        StorageBackend::SensorFile => {
            if !config.sensors.is_empty() {
                warn!(
                    "Ignoring {} configured sensors, the sensor list comes from {}",
                    config.sensors.len(),
                    config.storage.path.display()
                );
            }
            let file = Arc::new(SensorFile::new(&config.storage.path));
            let sensors: Arc<dyn SensorRegistry> = file.clone();
            let alarms: Arc<dyn AlarmStore> = file;
            (sensors, alarms)
        }
        StorageBackend::AlarmFile => {
            let alarms: Arc<dyn AlarmStore> = Arc::new(AlarmFile::new(&config.storage.path));
            (configured_sensors(config), alarms)
        }
        StorageBackend::Memory => {
            let alarms: Arc<dyn AlarmStore> = Arc::new(MemoryAlarmStore::new());
            (configured_sensors(config), alarms)
        }
    }
}

fn configured_sensors(config: &AppConfig) -> Arc<dyn SensorRegistry> {
    let sensors = ConfiguredSensors::new(config.sensors());
    if sensors.is_empty() {
        warn!("No sensors configured");
    }
    Arc::new(sensors)
}

fn build_readings(config: &AppConfig) -> Result<Arc<dyn ReadingSource>> {
    let source = HttpReadingSource::new(
        config.source.url.clone(),
        Duration::from_secs(config.source.timeout_secs),
    )
    .context("Failed to build HTTP client for the reading source")?;
    Ok(Arc::new(source))
}

impl Monitor {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let (sensors, alarms) = build_storage(config);
        let notifier: Arc<dyn Notifier> = Arc::from(notifier::from_config(&config.mailer)?);
        Ok(Self {
            sensors,
            alarms,
            readings: build_readings(config)?,
            notifier,
            policy: config.policy(),
            notify_mode: config.monitor.notify,
            sender: config.mailer.from.clone(),
        })
    }

    /// Wires `config`, reusing the parts whose settings did not change since
    /// `previous` so that e.g. a memory store keeps its state.
    pub fn reconfigure(&self, config: &AppConfig, previous: &AppConfig) -> Result<Self> {
        let (sensors, alarms) = if config.storage == previous.storage {
            let sensors = match config.storage.backend {
                StorageBackend::SensorFile => self.sensors.clone(),
                _ => configured_sensors(config),
            };
            (sensors, self.alarms.clone())
        } else {
            info!("Storage settings changed, switching to {:?} at {}", config.storage.backend, config.storage.path.display());
            build_storage(config)
        };

        let notifier = if config.mailer == previous.mailer {
            self.notifier.clone()
        } else {
            Arc::from(notifier::from_config(&config.mailer)?)
        };

        let readings = if config.source == previous.source {
            self.readings.clone()
        } else {
            build_readings(config)?
        };

        Ok(Self {
            sensors,
            alarms,
            readings,
            notifier,
            policy: config.policy(),
            notify_mode: config.monitor.notify,
            sender: config.mailer.from.clone(),
        })
    }

    pub async fn check(&self, now: DateTime<Utc>) -> Result<CycleSummary, CheckError> {
        let cycle = CheckCycle {
            sensors: self.sensors.as_ref(),
            readings: self.readings.as_ref(),
            alarms: self.alarms.as_ref(),
            notifier: self.notifier.as_ref(),
            policy: self.policy,
            notify_mode: self.notify_mode,
            sender: &self.sender,
        };
        cycle.run(now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorConfig;
    use crate::models::{Alarm, AlarmState};

    fn memory_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.sensors.push(SensorConfig {
            id: "123".to_string(),
            email_address: "owner@example.org".to_string(),
            threshold: None,
            owner: None,
        });
        config
    }

    #[tokio::test]
    async fn test_from_config_memory_backend() {
        let monitor = Monitor::from_config(&memory_config()).unwrap();
        let mut iter = monitor.sensors.iter().await.unwrap();
        assert_eq!(iter.next().await.unwrap().unwrap().id, "123");
        assert!(monitor.alarms.get("123").await.unwrap().is_clear());
        assert_eq!(monitor.sender, "alert@monitoring.meetjescraper.online");
    }

    #[tokio::test]
    async fn test_reconfigure_keeps_unchanged_store() {
        let previous = memory_config();
        let monitor = Monitor::from_config(&previous).unwrap();
        let alarm = Alarm {
            offline: AlarmState::SetAt(Utc::now()),
            ..Alarm::default()
        };
        monitor.alarms.store("123", &alarm).await.unwrap();

        let mut config = previous.clone();
        config.monitor.threshold = 3.0;
        config.sensors[0].threshold = Some(3.1);
        let next = monitor.reconfigure(&config, &previous).unwrap();

        assert_eq!(next.alarms.get("123").await.unwrap(), alarm);
        assert_eq!(next.policy.default_threshold, 3.0);
        let mut iter = next.sensors.iter().await.unwrap();
        assert_eq!(iter.next().await.unwrap().unwrap().threshold, Some(3.1));
    }

    #[tokio::test]
    async fn test_reconfigure_switches_store() {
        let previous = memory_config();
        let monitor = Monitor::from_config(&previous).unwrap();
        monitor
            .alarms
            .store(
                "123",
                &Alarm {
                    offline: AlarmState::SetAt(Utc::now()),
                    ..Alarm::default()
                },
            )
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let mut config = previous.clone();
        config.storage.backend = StorageBackend::AlarmFile;
        config.storage.path = dir.path().join("alarms.json");
        let next = monitor.reconfigure(&config, &previous).unwrap();

        assert!(next.alarms.get("123").await.unwrap().is_clear());
    }

    #[test]
    fn test_bad_mailer_secret_fails() {
        let mut config = memory_config();
        config.mailer.secret_path = Some("/nonexistent/secret".into());
        assert!(Monitor::from_config(&config).is_err());
    }
}
