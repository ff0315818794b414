use async_trait::async_trait;
use log::info;

use super::{Notifier, NotifyError};

/// Logs alerts instead of mailing them, for setups without mail credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, from: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!("not sending mail from {} to {}: {}\n{}", from, to, subject, body);
        Ok(())
    }
}
