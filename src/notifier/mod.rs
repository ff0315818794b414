use anyhow::Context;
use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::config::MailerConfig;
use crate::models::{Alarm, Reading, Sensor};
use crate::utils::file;

mod log_only;
mod smtp;

pub use log_only::LogNotifier;
pub use smtp::SmtpNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("timed out sending mail")]
    Timeout,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, from: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// When the check cycle sends a notification for an evaluated alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMode {
    /// Every cycle in which any fault is set.
    #[default]
    Active,
    /// Only cycles in which a fault was newly raised.
    Raised,
}

impl NotifyMode {
    pub fn should_notify(&self, previous: &Alarm, current: &Alarm) -> bool {
        match self {
            NotifyMode::Active => !current.is_clear(),
            NotifyMode::Raised => current.raised_since(previous),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

const LAST_SEEN_FORMAT: &str = "%d %b %y %H:%M UTC";

/// Builds the alert for `alarm`, `None` when nothing is wrong.
///
/// Faults are listed offline first, then low voltage, then GPS.
pub fn compose(sensor: &Sensor, alarm: &Alarm, reading: Option<&Reading>) -> Option<Notification> {
    let mut faults = Vec::new();

    if alarm.offline.is_set() {
        let last_seen = match reading {
            Some(r) => format!("It was last seen at {}.", r.timestamp.format(LAST_SEEN_FORMAT)),
            None => "No reading has ever been received from it.".to_string(),
        };
        faults.push((
            format!("Sensor {} is offline", sensor.id),
            format!("- The sensor seems to be offline. {}", last_seen),
        ));
    }

    if alarm.low_voltage.is_set() {
        let voltage = match reading {
            Some(r) => format!("{:.2}V", r.voltage),
            None => "unknown".to_string(),
        };
        faults.push((
            format!("Sensor {} low battery warning", sensor.id),
            format!(
                "- The sensor is low on battery, the latest voltage reading is {}.\n  \
                 Replace the batteries as soon as possible to avoid the sensor going offline.",
                voltage
            ),
        ));
    }

    if alarm.gps_missing.is_set() {
        faults.push((
            format!("Sensor {} is missing GPS lock", sensor.id),
            "- The sensor is missing GPS lock.\n  \
             Make sure it has a clear view of the sky and try resetting it while outdoors."
                .to_string(),
        ));
    }

    let subject = match faults.len() {
        0 => return None,
        1 => faults[0].0.clone(),
        _ => format!("Sensor {} needs attention", sensor.id),
    };
    let lines: Vec<&str> = faults.iter().map(|(_, line)| line.as_str()).collect();

    let body = format!(
        "Hi,\n\n\
         This is an automated message about your sensor with ID {}.\n\n\
         {}\n\n\
         -- \n\
         Regards,\n\n\
         The sensor monitoring robot",
        sensor.id,
        lines.join("\n\n")
    );

    Some(Notification { subject, body })
}

/// SMTP when a mailer secret is configured, log-only otherwise.
pub fn from_config(config: &MailerConfig) -> anyhow::Result<Box<dyn Notifier>> {
    let Some(secret_path) = &config.secret_path else {
        info!("No mailer secret configured, alerts will only be logged");
        return Ok(Box::new(LogNotifier));
    };

    let password = file::read_secret(secret_path)
        .with_context(|| format!("Failed to read mailer secret from {}", secret_path.display()))?;
    let username = config.username.clone().unwrap_or_else(|| config.from.clone());
    let notifier = SmtpNotifier::new(&config.smtp_host, config.smtp_port, username, password)
        .context("Failed to set up SMTP transport")?;

    info!("Sending alerts through {}:{}", config.smtp_host, config.smtp_port);
    Ok(Box::new(notifier))
}
