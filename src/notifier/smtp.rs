use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::info;
use std::time::Duration;

use super::{Notifier, NotifyError};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Plain-text mail over an authenticated STARTTLS relay.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: String,
    ) -> Result<Self, NotifyError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
            .port(port)
            .credentials(Credentials::new(username, password))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, from: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(from.parse::<Mailbox>()?)
            .to(to.parse::<Mailbox>()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))?;

        let response = tokio::time::timeout(SEND_TIMEOUT, self.transport.send(message))
            .await
            .map_err(|_| NotifyError::Timeout)??;

        info!("mail sent to {}: {}", to, response.code());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> SmtpNotifier {
        SmtpNotifier::new("localhost", 587, "user".to_string(), "secret".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_recipient_fails_before_connecting() {
        let result = notifier()
            .send("not-an-email", "alert@example.org", "subject", "body")
            .await;
        assert!(matches!(result, Err(NotifyError::Address(_))));
    }

    #[tokio::test]
    async fn test_invalid_sender_fails_before_connecting() {
        let result = notifier()
            .send("owner@example.org", "", "subject", "body")
            .await;
        assert!(matches!(result, Err(NotifyError::Address(_))));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(NotifyError::Timeout.to_string(), "timed out sending mail");
        assert_eq!(
            NotifyError::Build("missing body".to_string()).to_string(),
            "email build error: missing body"
        );
    }
}
