use async_trait::async_trait;
use thiserror::Error;

use crate::models::Reading;

mod http;

pub use http::HttpReadingSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("reading source returned HTTP {0}")]
    Status(u16),

    #[error("invalid reading payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Supplies the latest telemetry sample of a sensor.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// `Ok(None)` when the source has no sample at all for `sensor_id`.
    async fn fetch(&self, sensor_id: &str) -> Result<Option<Reading>, FetchError>;
}
