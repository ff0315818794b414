use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f32,
    pub lng: f32,
}

impl Position {
    // (0,0) is what the sensors report without a GPS fix
    pub fn is_no_fix(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

/// One telemetry sample, as published by the reading source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: String,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub voltage: f32,
    #[serde(rename = "firmware_version", default)]
    pub firmware: String,
    #[serde(
        rename = "coordinates",
        default,
        serialize_with = "serialize_position",
        deserialize_with = "deserialize_position"
    )]
    pub position: Option<Position>,
}

fn serialize_position<S: Serializer>(
    position: &Option<Position>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    position
        .unwrap_or(Position { lat: 0.0, lng: 0.0 })
        .serialize(serializer)
}

fn deserialize_position<'de, D>(deserializer: D) -> Result<Option<Position>, D::Error>
where
    D: Deserializer<'de>,
{
    let position: Option<Position> = Option::deserialize(deserializer)?;
    Ok(position.filter(|p| !p.is_no_fix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reading() {
        let json = r#"{
            "sensor_id": "123",
            "date": "2019-07-03T23:12:45Z",
            "voltage": 3.31,
            "firmware_version": "v4",
            "coordinates": {"lat": 52.15, "lng": 5.38}
        }"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.sensor_id, "123");
        assert_eq!(reading.voltage, 3.31);
        assert_eq!(reading.firmware, "v4");
        assert_eq!(reading.position, Some(Position { lat: 52.15, lng: 5.38 }));
    }

    #[test]
    fn test_gps_sentinel_is_none() {
        let json = r#"{"sensor_id": "1", "date": "2019-07-03T23:12:45Z", "voltage": 3.3, "coordinates": {"lat": 0, "lng": 0}}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.position, None);

        let json = r#"{"sensor_id": "1", "date": "2019-07-03T23:12:45Z", "voltage": 3.3}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.position, None);

        let value = serde_json::to_value(&reading).unwrap();
        assert_eq!(value["coordinates"]["lat"], 0.0);
        assert_eq!(value["coordinates"]["lng"], 0.0);
    }

    #[test]
    fn test_only_origin_is_no_fix() {
        assert!(Position { lat: 0.0, lng: 0.0 }.is_no_fix());
        assert!(!Position { lat: 0.0, lng: 5.1 }.is_no_fix());
    }
}
