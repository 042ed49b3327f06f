use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};

use super::{Alert, NotificationChannel, NotifyError};
use crate::config::EmailConfig;
use crate::db::Channel;

/// Implicit-TLS SMTP port; anything else negotiates STARTTLS.
const SMTPS_PORT: u16 = 465;

pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl EmailChannel {
    /// # Errors
    ///
    /// Returns an error if the SMTP host or either address is invalid.
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self> {
        let from: Mailbox = config.from.parse().context("Invalid NOTIFY_EMAIL_FROM")?;
        let to: Mailbox = config.to.parse().context("Invalid NOTIFY_EMAIL_TO")?;

        let creds = Credentials::new(config.smtp_user.clone(), config.smtp_pass.clone());
        let builder = if config.smtp_port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .context("Invalid SMTP_HOST")?;

        let mailer = builder
            .port(config.smtp_port)
            .credentials(creds)
            .timeout(Some(timeout))
            .build();

        Ok(Self { mailer, from, to })
    }
}

/// Plain-text message for one alert.
fn build_message(from: &Mailbox, to: &Mailbox, alert: &Alert) -> Result<Message, NotifyError> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(alert.subject())
        .header(header::ContentType::TEXT_PLAIN)
        .body(alert.body())
        .map_err(|e| NotifyError::Rejected(format!("build email: {e}")))
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let msg = build_message(&self.from, &self.to, alert)?;

        self.mailer
            .send(msg)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Category;

    fn alert() -> Alert {
        Alert {
            identity: "reddit:abc123".to_string(),
            title: "Rust for Beginners".to_string(),
            permalink: Some("https://www.reddit.com/r/udemyfreebies/comments/abc123/".to_string()),
            usefulness: 0.8,
            category: Category::ProgrammingLanguages,
            links: vec!["https://www.udemy.com/course/rust?couponCode=FREE".to_string()],
        }
    }

    fn config(from: &str) -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_user: "user".to_string(),
            smtp_pass: "pass".to_string(),
            from: from.to_string(),
            to: "me@example.com".to_string(),
        }
    }

    #[test]
    fn test_invalid_address_rejected() {
        let err = EmailChannel::new(&config("not an address"), Duration::from_secs(5))
            .err()
            .unwrap();
        assert!(err.to_string().contains("NOTIFY_EMAIL_FROM"));
    }

    #[test]
    fn test_invalid_recipient_rejected() {
        let mut cfg = config("Course Scout <scout@example.com>");
        cfg.to = "bad@@example".to_string();
        let err = EmailChannel::new(&cfg, Duration::from_secs(5)).err().unwrap();
        assert!(err.to_string().contains("NOTIFY_EMAIL_TO"));
    }

    #[test]
    fn test_build_message() {
        let from: Mailbox = "Course Scout <scout@example.com>".parse().unwrap();
        let to: Mailbox = "me@example.com".parse().unwrap();
        let msg = build_message(&from, &to, &alert()).unwrap();

        let envelope = msg.envelope();
        assert_eq!(envelope.from().map(ToString::to_string).as_deref(), Some("scout@example.com"));
        assert_eq!(
            envelope.to().iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["me@example.com"]
        );

        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("Subject: Free course: Rust for Beginners"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("Category: Programming Languages"));
        assert!(raw.contains("couponCode=FREE"));
    }
}
