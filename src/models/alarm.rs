use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// State of one debounced alarm field.
///
/// `SetAt` holds the moment the fault was first observed in its current
/// unresolved streak. Stored documents use the zero time
/// (`0001-01-01T00:00:00Z`) for `Unset`; the epoch and `null` are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmState {
    #[default]
    Unset,
    SetAt(DateTime<Utc>),
}

impl AlarmState {
    pub fn is_set(&self) -> bool {
        matches!(self, AlarmState::SetAt(_))
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            AlarmState::Unset => None,
            AlarmState::SetAt(at) => Some(*at),
        }
    }
}

fn zero_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn is_sentinel(at: &DateTime<Utc>) -> bool {
    *at <= zero_time() || at.timestamp() == 0
}

impl Serialize for AlarmState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AlarmState::Unset => zero_time().serialize(serializer),
            AlarmState::SetAt(at) => at.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AlarmState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value: Option<DateTime<Utc>> = Option::deserialize(deserializer)?;
        Ok(match value {
            Some(at) if !is_sentinel(&at) => AlarmState::SetAt(at),
            _ => AlarmState::Unset,
        })
    }
}

/// Persisted fault state of one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Alarm {
    #[serde(default)]
    pub offline: AlarmState,
    #[serde(rename = "voltage", default)]
    pub low_voltage: AlarmState,
    #[serde(rename = "gps", default)]
    pub gps_missing: AlarmState,
}

impl Alarm {
    pub fn is_clear(&self) -> bool {
        !self.offline.is_set() && !self.low_voltage.is_set() && !self.gps_missing.is_set()
    }

    /// True when any field is set in `self` but differs from `previous`,
    /// i.e. a fault was raised during the evaluation that produced `self`.
    pub fn raised_since(&self, previous: &Alarm) -> bool {
        let raised = |new: &AlarmState, old: &AlarmState| new.is_set() && new != old;
        raised(&self.offline, &previous.offline)
            || raised(&self.low_voltage, &previous.low_voltage)
            || raised(&self.gps_missing, &previous.gps_missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 7, 3, 23, 12, 45).unwrap()
    }

    #[test]
    fn test_default_alarm_is_clear() {
        let alarm = Alarm::default();
        assert!(alarm.is_clear());
        assert_eq!(alarm.offline, AlarmState::Unset);
    }

    #[test]
    fn test_unset_written_as_zero_time() {
        let alarm = Alarm {
            low_voltage: AlarmState::SetAt(at()),
            ..Alarm::default()
        };
        let json = serde_json::to_value(alarm).unwrap();
        assert_eq!(json["offline"], "0001-01-01T00:00:00Z");
        assert_eq!(json["gps"], "0001-01-01T00:00:00Z");
        assert_eq!(json["voltage"], "2019-07-03T23:12:45Z");
    }

    #[test]
    fn test_sentinels_read_as_unset() {
        let json = r#"{"offline": null, "voltage": "1970-01-01T00:00:00Z"}"#;
        let alarm: Alarm = serde_json::from_str(json).unwrap();
        assert!(alarm.is_clear());

        let json = r#"{"offline": "0001-01-01T00:00:00Z", "gps": "2019-07-03T23:12:45Z", "voltage": "0001-01-01T00:00:00Z"}"#;
        let alarm: Alarm = serde_json::from_str(json).unwrap();
        assert_eq!(alarm.gps_missing, AlarmState::SetAt(at()));
        assert!(!alarm.offline.is_set());
        assert!(!alarm.low_voltage.is_set());
    }

    #[test]
    fn test_raised_since() {
        let previous = Alarm {
            low_voltage: AlarmState::SetAt(at()),
            ..Alarm::default()
        };
        assert!(!previous.raised_since(&previous));

        let next = Alarm {
            gps_missing: AlarmState::SetAt(at()),
            ..previous
        };
        assert!(next.raised_since(&previous));
        assert!(!Alarm::default().raised_since(&previous));
    }
}
