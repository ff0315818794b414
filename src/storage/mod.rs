//! Alarm persistence and sensor enumeration.
//!
//! Alarm state can live in its own keyed collection ([`AlarmFile`],
//! [`MemoryAlarmStore`]) or embedded in the sensor records ([`SensorFile`]).
//! The check cycle only sees the [`AlarmStore`] and [`SensorRegistry`] traits
//! and does not care which shape backs them.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Alarm, Sensor};

mod alarm_file;
mod memory;
mod sensor_file;

pub use alarm_file::AlarmFile;
pub use memory::MemoryAlarmStore;
pub use sensor_file::SensorFile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed storage document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown sensor: {0}")]
    UnknownSensor(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Get/put access to the alarm state of a sensor.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    /// Current alarm of `sensor_id`, all-unset when nothing was stored yet.
    async fn get(&self, sensor_id: &str) -> StoreResult<Alarm>;

    async fn store(&self, sensor_id: &str, alarm: &Alarm) -> StoreResult<()>;
}

/// A source of sensors to check, restarted on every call to [`iter`](Self::iter).
#[async_trait]
pub trait SensorRegistry: Send + Sync {
    async fn iter(&self) -> StoreResult<Box<dyn SensorIter + '_>>;
}

/// `Ok(None)` is the end of the sequence; `Err` is a hard failure.
#[async_trait]
pub trait SensorIter: Send {
    async fn next(&mut self) -> StoreResult<Option<Sensor>>;
}

pub struct VecSensorIter {
    inner: std::vec::IntoIter<Sensor>,
}

impl VecSensorIter {
    pub fn new(sensors: Vec<Sensor>) -> Self {
        Self {
            inner: sensors.into_iter(),
        }
    }
}

#[async_trait]
impl SensorIter for VecSensorIter {
    async fn next(&mut self) -> StoreResult<Option<Sensor>> {
        Ok(self.inner.next())
    }
}

/// Sensors listed in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSensors {
    sensors: Vec<Sensor>,
}

impl ConfiguredSensors {
    pub fn new(sensors: Vec<Sensor>) -> Self {
        Self { sensors }
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

#[async_trait]
impl SensorRegistry for ConfiguredSensors {
    async fn iter(&self) -> StoreResult<Box<dyn SensorIter + '_>> {
        Ok(Box::new(VecSensorIter::new(self.sensors.clone())))
    }
}
