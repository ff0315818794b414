use async_trait::async_trait;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{AlarmStore, SensorIter, SensorRegistry, StoreError, StoreResult, VecSensorIter};
use crate::models::{Alarm, Sensor};
use crate::utils::file;

/// Sensor records with their alarm state embedded, stored as one JSON array.
///
/// Serves both as the registry and as the alarm store; storing an alarm only
/// rewrites the `alarms` object of the matching record.
#[derive(Debug)]
pub struct SensorFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SensorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<Vec<Sensor>> {
        match file::read_if_exists(&self.path).await? {
            Some(contents) if !contents.trim().is_empty() => Ok(serde_json::from_str(&contents)?),
            _ => {
                warn!("sensor file {} is missing or empty", self.path.display());
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl SensorRegistry for SensorFile {
    async fn iter(&self) -> StoreResult<Box<dyn SensorIter + '_>> {
        let sensors = self.load().await?;
        debug!("loaded {} sensors from {}", sensors.len(), self.path.display());
        Ok(Box::new(VecSensorIter::new(sensors)))
    }
}

#[async_trait]
impl AlarmStore for SensorFile {
    async fn get(&self, sensor_id: &str) -> StoreResult<Alarm> {
        let sensors = self.load().await?;
        Ok(sensors
            .iter()
            .find(|s| s.id == sensor_id)
            .map(|s| s.alarms)
            .unwrap_or_default())
    }

    async fn store(&self, sensor_id: &str, alarm: &Alarm) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut sensors = self.load().await?;
        let sensor = sensors
            .iter_mut()
            .find(|s| s.id == sensor_id)
            .ok_or_else(|| StoreError::UnknownSensor(sensor_id.to_string()))?;
        sensor.alarms = *alarm;

        let contents = serde_json::to_vec_pretty(&sensors)?;
        file::write_atomic(&self.path, &contents).await?;
        Ok(())
    }
}
