use booking_notifier_domain::IcsMethod;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Calendar document attached to a message. The method is repeated on the
/// attachment content type so that mail clients show accept/decline buttons.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarAttachment {
    pub method: IcsMethod,
    pub filename: String,
    pub content: String,
}

impl CalendarAttachment {
    pub fn content_type(&self) -> String {
        format!("text/calendar; charset=utf-8; method={}", self.method.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub from: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
    pub calendar: Option<CalendarAttachment>,
}

#[derive(Error, Debug)]
pub enum MailTransportError {
    #[error("Mail relay could not be reached: {0}")]
    Unreachable(String),
    #[error("Mail relay rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Message was not delivered: {0}")]
    Failed(String),
}

/// Hands a message over for delivery. Implementations never retry, that
/// is left to the notification queue.
#[async_trait::async_trait]
pub trait IMailTransport: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailTransportError>;
}

/// Posts messages as json to an http mail relay
pub struct RelayMailTransport {
    client: Client,
    url: String,
}

impl RelayMailTransport {
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(url: String) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Self::TIMEOUT).build()?;
        Ok(Self { client, url })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayAttachment<'a> {
    filename: &'a str,
    content_type: String,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
    attachments: Vec<RelayAttachment<'a>>,
}

#[async_trait::async_trait]
impl IMailTransport for RelayMailTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailTransportError> {
        let attachments = message
            .calendar
            .iter()
            .map(|calendar| RelayAttachment {
                filename: &calendar.filename,
                content_type: calendar.content_type(),
                content: &calendar.content,
            })
            .collect();
        let body = RelayRequest {
            from: &message.from,
            to: &message.recipients,
            subject: &message.subject,
            html: &message.html_body,
            text: &message.text_body,
            attachments,
        };

        let res = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailTransportError::Unreachable(e.to_string()))?;

        let status = res.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = res.text().await.unwrap_or_default();
            Err(MailTransportError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Used when no mail relay is configured
pub struct LogMailTransport {}

#[async_trait::async_trait]
impl IMailTransport for LogMailTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailTransportError> {
        info!(
            recipients = ?message.recipients,
            subject = %message.subject,
            method = ?message.calendar.as_ref().map(|c| c.method.as_str()),
            "No mail relay configured, not sending notification"
        );
        Ok(())
    }
}

/// Keeps delivered messages in memory and can be told to fail
#[derive(Default)]
pub struct InMemoryMailTransport {
    sent: Mutex<Vec<OutboundMessage>>,
    failures_left: AtomicUsize,
}

impl InMemoryMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` deliveries fail
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait::async_trait]
impl IMailTransport for InMemoryMailTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<(), MailTransportError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                if left > 0 {
                    Some(left - 1)
                } else {
                    None
                }
            })
            .is_ok();
        if failing {
            return Err(MailTransportError::Failed(
                "Mailbox temporarily unavailable".into(),
            ));
        }

        match self.sent.lock() {
            Ok(mut sent) => sent.push(message.clone()),
            Err(poisoned) => poisoned.into_inner().push(message.clone()),
        }
        Ok(())
    }
}
