use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::time::Instant;
use thiserror::Error;

use crate::collectors::ReadingSource;
use crate::evaluator::AlarmPolicy;
use crate::notifier::{self, Notifier, NotifyMode};
use crate::storage::{AlarmStore, SensorRegistry, StoreError};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to enumerate sensors: {0}")]
    Iteration(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub checked: usize,
    pub notified: usize,
    pub skipped: usize,
    pub store_failures: usize,
}

/// Everything one sweep over the sensors needs.
pub struct CheckCycle<'a> {
    pub sensors: &'a dyn SensorRegistry,
    pub readings: &'a dyn ReadingSource,
    pub alarms: &'a dyn AlarmStore,
    pub notifier: &'a dyn Notifier,
    pub policy: AlarmPolicy,
    pub notify_mode: NotifyMode,
    /// Sender address of the alerts.
    pub sender: &'a str,
}

impl CheckCycle<'_> {
    /// Evaluates every sensor once, in registry order.
    ///
    /// A sensor whose alarm state, reading or notification fails is logged and
    /// skipped without persisting anything. Only a failure to enumerate the
    /// sensors aborts the sweep.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<CycleSummary, CheckError> {
        info!("checking sensors");
        let start = Instant::now();
        let mut summary = CycleSummary::default();

        let mut sensors = self.sensors.iter().await?;
        while let Some(sensor) = sensors.next().await? {
            debug!("checking {:?}", sensor);

            let previous = match self.alarms.get(&sensor.id).await {
                Ok(alarm) => alarm,
                Err(e) => {
                    error!("error getting alarms for {}: {}", sensor.id, e);
                    summary.skipped += 1;
                    continue;
                }
            };

            let reading = match self.readings.fetch(&sensor.id).await {
                Ok(reading) => reading,
                Err(e) => {
                    error!("error reading sensor {}, unable to monitor: {}", sensor.id, e);
                    summary.skipped += 1;
                    continue;
                }
            };
            if reading.is_none() {
                warn!("no readings available for sensor {}", sensor.id);
            }

            let alarm = self.policy.evaluate(&sensor, reading.as_ref(), &previous, now);
            summary.checked += 1;

            if self.notify_mode.should_notify(&previous, &alarm) {
                if let Some(message) = notifier::compose(&sensor, &alarm, reading.as_ref()) {
                    if let Err(e) = self
                        .notifier
                        .send(&sensor.email_address, self.sender, &message.subject, &message.body)
                        .await
                    {
                        error!("failed to notify {} about sensor {}: {}", sensor.email_address, sensor.id, e);
                        summary.skipped += 1;
                        continue;
                    }
                    summary.notified += 1;
                }
            }

            if let Err(e) = self.alarms.store(&sensor.id, &alarm).await {
                error!("failed to store alarm for sensor {}: {}", sensor.id, e);
                summary.store_failures += 1;
            }
        }

        info!(
            "done checking: {} checked, {} notified, {} skipped, {} store failures in {} ms",
            summary.checked,
            summary.notified,
            summary.skipped,
            summary.store_failures,
            start.elapsed().as_millis()
        );
        Ok(summary)
    }
}
