//! Outgoing mail.
//!
//! Callers enqueue an [`EmailMessage`] through a [`Mailer`] handle and return
//! immediately. A single background worker drains the queue and hands each
//! message to a [`MailTransport`], retrying with a linear backoff. Delivery
//! failures are logged and never reach the request that queued the message.

pub mod templates;

pub use templates::send_password_reset_email;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Mail queue is full")]
    QueueFull,

    #[error("Mail worker has stopped")]
    Closed,
}

/// Something that can actually deliver a message.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Writes messages to the log instead of a mail server.
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            "📧 Mail from {} to {}: {}",
            message.sender,
            message.recipients.join(", "),
            message.subject
        );
        tracing::debug!("{}", message.text_body);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MailSettings {
    pub queue_size: usize,
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly after that.
    pub retry_delay: Duration,
}

impl MailSettings {
    pub fn from_config(config: &Config) -> Self {
        MailSettings {
            queue_size: config.mail_queue_size,
            max_attempts: config.mail_max_attempts,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Cheap, clonable handle to the mail worker.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<EmailMessage>,
}

impl Mailer {
    /// Start the worker. It runs until every `Mailer` clone is dropped and
    /// the queue is drained.
    pub fn spawn(transport: Arc<dyn MailTransport>, settings: MailSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(settings.queue_size.max(1));
        let handle = tokio::spawn(run_worker(rx, transport, settings));
        (Mailer { tx }, handle)
    }

    pub fn enqueue(&self, message: EmailMessage) -> Result<(), MailError> {
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => MailError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => MailError::Closed,
        })
    }

    pub fn send_email(
        &self,
        subject: &str,
        sender: &str,
        recipients: &[String],
        text_body: &str,
        html_body: &str,
    ) {
        let message = EmailMessage {
            subject: subject.to_string(),
            sender: sender.to_string(),
            recipients: recipients.to_vec(),
            text_body: text_body.to_string(),
            html_body: html_body.to_string(),
        };

        if let Err(e) = self.enqueue(message) {
            tracing::error!("❌ Dropping mail '{}': {}", subject, e);
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<EmailMessage>,
    transport: Arc<dyn MailTransport>,
    settings: MailSettings,
) {
    tracing::debug!("Mail worker started");

    while let Some(message) = rx.recv().await {
        deliver(transport.as_ref(), &settings, &message).await;
    }

    tracing::debug!("Mail worker stopped");
}

async fn deliver(transport: &dyn MailTransport, settings: &MailSettings, message: &EmailMessage) -> bool {
    let max_attempts = settings.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match transport.send(message).await {
            Ok(()) => return true,
            Err(e) if attempt < max_attempts => {
                tracing::warn!(
                    "Mail '{}' attempt {}/{} failed: {}",
                    message.subject,
                    attempt,
                    max_attempts,
                    e
                );
                tokio::time::sleep(settings.retry_delay * attempt).await;
            }
            Err(e) => {
                tracing::error!(
                    "❌ Giving up on mail '{}' after {} attempts: {}",
                    message.subject,
                    max_attempts,
                    e
                );
            }
        }
    }

    false
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<EmailMessage>>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
            self.sent.lock().await.push(message.clone());
            Ok(())
        }
    }

    /// Fails the first `failures` calls.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl MailTransport for FlakyTransport {
        async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(MailError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn settings(max_attempts: u32) -> MailSettings {
        MailSettings {
            queue_size: 8,
            max_attempts,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_send_email_is_delivered_by_worker() {
        let transport = Arc::new(RecordingTransport::default());
        let (mailer, worker) = Mailer::spawn(transport.clone(), settings(3));

        mailer.send_email(
            "Hello",
            "no-reply@localhost",
            &["susan@example.com".to_string()],
            "text",
            "<p>html</p>",
        );
        drop(mailer);
        worker.await.unwrap();

        let sent = transport.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Hello");
        assert_eq!(sent[0].recipients, vec!["susan@example.com".to_string()]);
        assert_eq!(sent[0].html_body, "<p>html</p>");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let transport = FlakyTransport { failures: 2, calls: AtomicU32::new(0) };
        let message = EmailMessage {
            subject: "retry".to_string(),
            sender: "a@localhost".to_string(),
            recipients: vec!["b@localhost".to_string()],
            text_body: String::new(),
            html_body: String::new(),
        };

        assert!(deliver(&transport, &settings(3), &message).await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let transport = FlakyTransport { failures: u32::MAX, calls: AtomicU32::new(0) };
        let message = EmailMessage {
            subject: "doomed".to_string(),
            sender: "a@localhost".to_string(),
            recipients: vec!["b@localhost".to_string()],
            text_body: String::new(),
            html_body: String::new(),
        };

        assert!(!deliver(&transport, &settings(2), &message).await);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_full_queue_is_reported() {
        // Keep the worker busy so nothing is drained
        struct Stuck;

        #[async_trait]
        impl MailTransport for Stuck {
            async fn send(&self, _message: &EmailMessage) -> Result<(), MailError> {
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        let (mailer, worker) = Mailer::spawn(
            Arc::new(Stuck),
            MailSettings { queue_size: 1, max_attempts: 1, retry_delay: Duration::ZERO },
        );
        let message = EmailMessage {
            subject: "x".to_string(),
            sender: "a@localhost".to_string(),
            recipients: Vec::new(),
            text_body: String::new(),
            html_body: String::new(),
        };

        let mut results = Vec::new();
        for _ in 0..3 {
            results.push(mailer.enqueue(message.clone()));
            tokio::task::yield_now().await;
        }
        assert!(results.iter().any(|r| matches!(r, Err(MailError::QueueFull))));
        worker.abort();
    }
}
