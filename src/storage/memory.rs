use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{AlarmStore, StoreResult};
use crate::models::Alarm;

/// Volatile alarm store, lost on restart. Used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryAlarmStore {
    alarms: RwLock<HashMap<String, Alarm>>,
}

impl MemoryAlarmStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.alarms.read().await.len()
    }
}

#[async_trait]
impl AlarmStore for MemoryAlarmStore {
    async fn get(&self, sensor_id: &str) -> StoreResult<Alarm> {
        Ok(self
            .alarms
            .read()
            .await
            .get(sensor_id)
            .copied()
            .unwrap_or_default())
    }

    async fn store(&self, sensor_id: &str, alarm: &Alarm) -> StoreResult<()> {
        self.alarms
            .write()
            .await
            .insert(sensor_id.to_string(), *alarm);
        Ok(())
    }
}
