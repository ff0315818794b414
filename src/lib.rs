pub mod checker;
pub mod collectors;
pub mod config;
pub mod evaluator;
pub mod models;
pub mod monitor;
pub mod notifier;
pub mod storage;
pub mod utils;

use crate::config::AppConfig;
use crate::monitor::Monitor;
use anyhow::Context;
use chrono::Utc;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    /// Overrides `mailer.secret_path` from the configuration file.
    pub mailer_secret: Option<PathBuf>,
    /// Check once and exit instead of running on a schedule.
    pub once: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(crate::config::DEFAULT_CONFIG_FILE),
            mailer_secret: None,
            once: false,
        }
    }
}

pub fn load_config(options: &RunOptions) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::from_file(&options.config_path)?;
    if let Some(secret) = &options.mailer_secret {
        config.mailer.secret_path = Some(secret.clone());
    }
    Ok(config)
}

pub async fn run(config: AppConfig, options: RunOptions) -> anyhow::Result<()> {
    info!("Starting sensor monitor");

    tokio::select! {
        result = main_loop(config, &options) => {
            match result {
                Ok(_) => info!("Monitor completed successfully"),
                Err(e) => {
                    error!("Monitor error: {e:#}");
                    return Err(e).context("Monitor failed to run");
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}

// The first tick completes immediately, which gives the eager check at startup.
// Cycles run inside the loop, so ticks that fire during a long cycle are skipped
// rather than overlapping it.
fn schedule(period: Duration, start: Instant) -> Interval {
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

async fn main_loop(mut config: AppConfig, options: &RunOptions) -> anyhow::Result<()> {
    let mut monitor = Monitor::from_config(&config).context("Failed to set up monitor")?;

    if options.once {
        let summary = monitor.check(Utc::now()).await?;
        debug!("{:?}", summary);
        return Ok(());
    }

    let mut interval = schedule(config.frequency(), Instant::now());
    info!("starting job every {} seconds", config.monitor.frequency_secs);

    // startup check, with the configuration just loaded
    interval.tick().await;
    check(&monitor).await;

    loop {
        interval.tick().await; // Wait for the next tick

        if let Some((next_config, next_monitor)) = reload(options, &config, &monitor) {
            if let Some(next_interval) = reschedule(&config, &next_config, Instant::now()) {
                interval = next_interval;
            }
            config = next_config;
            monitor = next_monitor;
        }

        check(&monitor).await;
    }
}

async fn check(monitor: &Monitor) {
    if let Err(e) = monitor.check(Utc::now()).await {
        error!("Check cycle failed, retrying next tick: {}", e);
    }
}

// A fresh interval starting one period after `now` when the frequency changed.
// A period too large to schedule keeps the current interval.
fn reschedule(current: &AppConfig, next: &AppConfig, now: Instant) -> Option<Interval> {
    let period = next.frequency();
    if period == current.frequency() {
        return None;
    }
    match now.checked_add(period) {
        Some(start) => {
            info!("frequency changed, now checking every {} seconds", next.monitor.frequency_secs);
            Some(schedule(period, start))
        }
        None => {
            warn!(
                "Cannot schedule checks every {} seconds, keeping every {} seconds",
                next.monitor.frequency_secs, current.monitor.frequency_secs
            );
            None
        }
    }
}

// Some only when the configuration changed and the new one could be wired;
// any failure keeps the current setup running.
fn reload(options: &RunOptions, current: &AppConfig, monitor: &Monitor) -> Option<(AppConfig, Monitor)> {
    let next = match load_config(options) {
        Ok(next) => next,
        Err(e) => {
            warn!("Failed to reload configuration, keeping the previous one: {e:#}");
            return None;
        }
    };
    if next == *current {
        return None;
    }

    match monitor.reconfigure(&next, current) {
        Ok(next_monitor) => {
            info!("Configuration reloaded from {}", options.config_path.display());
            Some((next, next_monitor))
        }
        Err(e) => {
            warn!("Failed to apply new configuration, keeping the previous one: {e:#}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(file: &mut NamedTempFile, contents: &str) {
        file.as_file_mut().set_len(0).unwrap();
        std::io::Seek::rewind(file.as_file_mut()).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    fn options(file: &NamedTempFile) -> RunOptions {
        RunOptions {
            config_path: file.path().to_path_buf(),
            ..RunOptions::default()
        }
    }

    const MEMORY_CONFIG: &str = "storage:\n  backend: memory\nsensors:\n  - id: \"123\"\n";

    #[test]
    fn test_load_config_applies_secret_override() {
        let mut file = NamedTempFile::new().unwrap();
        write_config(&mut file, MEMORY_CONFIG);
        let options = RunOptions {
            mailer_secret: Some(PathBuf::from("/run/secrets/mailer")),
            ..options(&file)
        };

        let config = load_config(&options).unwrap();
        assert_eq!(config.mailer.secret_path, Some(PathBuf::from("/run/secrets/mailer")));
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[tokio::test]
    async fn test_reload_keeps_previous_on_error() {
        let mut file = NamedTempFile::new().unwrap();
        write_config(&mut file, MEMORY_CONFIG);
        let options = options(&file);
        let config = load_config(&options).unwrap();
        let monitor = Monitor::from_config(&config).unwrap();

        // unchanged file
        assert!(reload(&options, &config, &monitor).is_none());

        write_config(&mut file, "storage: [not, a, map");
        assert!(reload(&options, &config, &monitor).is_none());

        write_config(&mut file, "storage:\n  backend: memory\nsensors:\n  - id: \"123\"\n  - id: \"456\"\n");
        let (next, _) = reload(&options, &config, &monitor).unwrap();
        assert_eq!(next.sensors.len(), 2);
    }

    #[tokio::test]
    async fn test_reschedule_only_on_frequency_change() {
        let current = AppConfig::default();
        let mut next = current.clone();
        next.monitor.threshold = 3.0;
        assert!(reschedule(&current, &next, Instant::now()).is_none());

        next.monitor.frequency_secs = 600;
        let interval = reschedule(&current, &next, Instant::now()).unwrap();
        assert_eq!(interval.period(), Duration::from_secs(600));
        assert_eq!(interval.missed_tick_behavior(), MissedTickBehavior::Skip);
    }

    #[tokio::test]
    async fn test_reschedule_out_of_range_keeps_current() {
        let current = AppConfig::default();
        let mut next = current.clone();
        next.monitor.frequency_secs = u64::MAX;
        assert!(reschedule(&current, &next, Instant::now()).is_none());
    }

    #[tokio::test]
    async fn test_first_tick_is_immediate() {
        let mut interval = schedule(Duration::from_secs(3600), Instant::now());
        let first = tokio::time::timeout(Duration::from_secs(5), interval.tick()).await;
        assert!(first.is_ok());
        let second = tokio::time::timeout(Duration::from_millis(50), interval.tick()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_run_once() {
        let mut file = NamedTempFile::new().unwrap();
        // no sensors, so nothing is fetched
        write_config(&mut file, "storage:\n  backend: memory\n");
        let options = RunOptions {
            once: true,
            ..options(&file)
        };
        let config = load_config(&options).unwrap();
        assert!(run(config, options).await.is_ok());
    }
}
