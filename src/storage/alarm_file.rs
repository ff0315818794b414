use async_trait::async_trait;
use indexmap::IndexMap;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use super::{AlarmStore, StoreResult};
use crate::models::Alarm;
use crate::utils::file;

/// Alarms kept in their own JSON document, keyed by sensor ID:
///
/// ```json
/// { "123": { "offline": "...", "voltage": "...", "gps": "..." } }
/// ```
#[derive(Debug)]
pub struct AlarmFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AlarmFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<IndexMap<String, Alarm>> {
        match file::read_if_exists(&self.path).await? {
            Some(contents) if !contents.trim().is_empty() => Ok(serde_json::from_str(&contents)?),
            _ => Ok(IndexMap::new()),
        }
    }
}

#[async_trait]
impl AlarmStore for AlarmFile {
    async fn get(&self, sensor_id: &str) -> StoreResult<Alarm> {
        let alarms = self.load().await?;
        Ok(alarms.get(sensor_id).copied().unwrap_or_default())
    }

    async fn store(&self, sensor_id: &str, alarm: &Alarm) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut alarms = self.load().await?;
        alarms.insert(sensor_id.to_string(), *alarm);
        let contents = serde_json::to_vec_pretty(&alarms)?;
        file::write_atomic(&self.path, &contents).await?;
        debug!("stored alarm for sensor {} in {}", sensor_id, self.path.display());
        Ok(())
    }
}
