pub mod alarm;
pub mod reading;
pub mod sensor;

pub use alarm::{Alarm, AlarmState};
pub use reading::{Position, Reading};
pub use sensor::Sensor;
