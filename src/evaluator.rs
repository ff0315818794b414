use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::models::{Alarm, AlarmState, Reading, Sensor};

pub const DEFAULT_THRESHOLD: f32 = 3.26;
pub const DEFAULT_DEBOUNCE_HOURS: i64 = 24;
pub const DEFAULT_OFFLINE_AFTER_HOURS: i64 = 6;

/// Timing and threshold parameters used to turn a reading into alarm state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmPolicy {
    /// How long a raised fault is held before it is re-tested from scratch.
    pub debounce: Duration,
    /// Age after which a reading no longer counts as a sign of life.
    pub stale_after: Duration,
    pub default_threshold: f32,
}

impl Default for AlarmPolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::hours(DEFAULT_DEBOUNCE_HOURS),
            stale_after: Duration::hours(DEFAULT_OFFLINE_AFTER_HOURS),
            default_threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl AlarmPolicy {
    pub fn threshold_for(&self, sensor: &Sensor) -> f32 {
        match sensor.threshold {
            Some(threshold) if threshold > 0.0 => threshold,
            _ => self.default_threshold,
        }
    }

    // Some(at) while a previously raised fault is inside its debounce window
    fn held(&self, previous: AlarmState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        previous.since().filter(|at| now - *at <= self.debounce)
    }

    /// Computes the new alarm state for one sensor.
    ///
    /// A `reading` of `None` means the source has no sample for the sensor and
    /// is treated like a stale one. Once offline is held or raised the other
    /// two checks are skipped and come back unset.
    pub fn evaluate(
        &self,
        sensor: &Sensor,
        reading: Option<&Reading>,
        previous: &Alarm,
        now: DateTime<Utc>,
    ) -> Alarm {
        let mut result = Alarm::default();

        if let Some(since) = self.held(previous.offline, now) {
            result.offline = AlarmState::SetAt(since);
            return result;
        }

        let reading = match reading {
            Some(reading) if now - reading.timestamp <= self.stale_after => reading,
            Some(reading) => {
                debug!(
                    "sensor {} is offline, last reading {} minutes old",
                    sensor.id,
                    (now - reading.timestamp).num_minutes()
                );
                result.offline = AlarmState::SetAt(now);
                return result;
            }
            None => {
                debug!("sensor {} has no readings, marking offline", sensor.id);
                result.offline = AlarmState::SetAt(now);
                return result;
            }
        };

        let threshold = self.threshold_for(sensor);
        result.low_voltage = match self.held(previous.low_voltage, now) {
            Some(since) => AlarmState::SetAt(since),
            None if reading.voltage < threshold => {
                debug!(
                    "sensor {} voltage is below threshold: {} < {}",
                    sensor.id, reading.voltage, threshold
                );
                AlarmState::SetAt(now)
            }
            None => AlarmState::Unset,
        };

        result.gps_missing = match self.held(previous.gps_missing, now) {
            Some(since) => AlarmState::SetAt(since),
            None if reading.position.is_none() => {
                debug!("sensor {} is missing GPS lock", sensor.id);
                AlarmState::SetAt(now)
            }
            None => AlarmState::Unset,
        };

        result
    }
}

/// [`AlarmPolicy::evaluate`] with the default policy.
pub fn evaluate(
    sensor: &Sensor,
    reading: Option<&Reading>,
    previous: &Alarm,
    now: DateTime<Utc>,
) -> Alarm {
    AlarmPolicy::default().evaluate(sensor, reading, previous, now)
}
