//! In-memory delivery handler that records what it was asked to send.

use super::{DeliveryHandler, SentEmail};
use crate::error::{MailerError, MailerResult};
use crate::models::Message;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Records every message it receives instead of transmitting it.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    sent: Arc<Mutex<Vec<Message>>>,
    failure: Option<String>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handler whose every send fails with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Arc::default(),
            failure: Some(message.into()),
        }
    }

    /// Messages accepted so far, in call order.
    pub async fn sent(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn was_sent_to(&self, to: &str) -> bool {
        self.sent.lock().await.iter().any(|m| m.to == to)
    }
}

#[async_trait]
impl DeliveryHandler for RecordingHandler {
    async fn send(&self, message: &Message) -> MailerResult<SentEmail> {
        if let Some(failure) = &self.failure {
            return Err(MailerError::Delivery(failure.clone()));
        }

        let mut sent = self.sent.lock().await;
        sent.push(message.clone());

        Ok(SentEmail {
            message_id: Some(format!("recorded-{}", sent.len())),
            accepted: true,
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> Message {
        Message {
            to: to.to_string(),
            from: "no-reply@example.com".to_string(),
            subject: "Test".to_string(),
            html: "<p>Body</p>".to_string(),
            text: "Body".to_string(),
        }
    }

    #[tokio::test]
    async fn test_records_messages_in_order() {
        let handler = RecordingHandler::new();

        let first = handler.send(&message("a@example.com")).await.unwrap();
        let second = handler.send(&message("b@example.com")).await.unwrap();

        assert_eq!(first.message_id.as_deref(), Some("recorded-1"));
        assert_eq!(second.message_id.as_deref(), Some("recorded-2"));
        assert_eq!(handler.sent_count().await, 2);
        assert!(handler.was_sent_to("b@example.com").await);
        assert!(!handler.was_sent_to("c@example.com").await);
    }

    #[tokio::test]
    async fn test_failing_handler_records_nothing() {
        let handler = RecordingHandler::failing("provider unavailable");

        let err = handler.send(&message("a@example.com")).await.unwrap_err();

        assert!(err.to_string().contains("provider unavailable"));
        assert_eq!(handler.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_clones_share_the_log() {
        let handler = RecordingHandler::new();
        let clone = handler.clone();

        clone.send(&message("a@example.com")).await.unwrap();

        assert_eq!(handler.sent().await.len(), 1);
    }
}
