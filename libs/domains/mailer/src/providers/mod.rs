//! Delivery handler implementations.
//!
//! This module contains the `DeliveryHandler` trait and the backends a
//! `Mailer` can hand composed messages to.

mod recording;
mod sendgrid;
mod ses;

pub use recording::RecordingHandler;
pub use sendgrid::{SendGridConfig, SendGridHandler};
pub use ses::{SesConfig, SesHandler, SesRequest};

use crate::error::MailerResult;
use crate::models::Message;
use async_trait::async_trait;
use serde::Serialize;

/// Represents a sent email with provider-specific message ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentEmail {
    /// Provider-specific message ID for tracking.
    pub message_id: Option<String>,
    /// Whether the email was accepted for delivery.
    pub accepted: bool,
}

/// Trait for delivery backends.
///
/// Implementations hold their credentials and client handle and nothing
/// else, so one instance can serve any number of concurrent sends.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    /// Transmit a composed message.
    async fn send(&self, message: &Message) -> MailerResult<SentEmail>;

    /// Get the handler name for logging.
    fn name(&self) -> &'static str;
}
