use serde::{Deserialize, Serialize};

use crate::models::alarm::Alarm;

/// A monitored device and where its alerts go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    #[serde(rename = "sensor_id")]
    pub id: String,
    #[serde(default)]
    pub email_address: String,
    // None (or zero) falls back to the configured default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub alarms: Alarm,
}

impl Sensor {
    pub fn new(id: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email_address: email_address.into(),
            threshold: None,
            owner: None,
            alarms: Alarm::default(),
        }
    }
}
