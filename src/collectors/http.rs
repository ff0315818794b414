use async_trait::async_trait;
use log::debug;
use std::time::{Duration, Instant};

use super::{FetchError, ReadingSource};
use crate::models::Reading;

/// Fetches the newest reading of a sensor from a JSON web API that answers
/// `GET <url>?sensor=<id>&limit=1` with an array of readings.
pub struct HttpReadingSource {
    client: reqwest::Client,
    url: String,
}

impl HttpReadingSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

pub(crate) fn parse_latest(body: &str) -> Result<Option<Reading>, FetchError> {
    let readings: Vec<Reading> = serde_json::from_str(body)?;
    Ok(readings.into_iter().next())
}

#[async_trait]
impl ReadingSource for HttpReadingSource {
    async fn fetch(&self, sensor_id: &str) -> Result<Option<Reading>, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .query(&[("sensor", sensor_id), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let body = response.text().await?;
        let result = parse_latest(&body);
        debug!("fetch({}) took: {} ms", sensor_id, start.elapsed().as_millis());
        result
    }
}
