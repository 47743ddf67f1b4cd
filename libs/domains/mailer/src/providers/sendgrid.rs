//! SendGrid delivery handler.

use super::{DeliveryHandler, SentEmail};
use crate::error::{MailerError, MailerResult};
use crate::models::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info};

/// Production SendGrid API base URL.
pub const DEFAULT_SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3";

/// SendGrid API configuration.
#[derive(Clone)]
pub struct SendGridConfig {
    /// SendGrid API key.
    pub api_key: String,
    /// SendGrid API base URL (defaults to production).
    pub api_url: String,
}

impl SendGridConfig {
    /// Create a new SendGrid configuration.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            api_url: DEFAULT_SENDGRID_API_URL.to_string(),
        }
    }

    /// Point the handler at a different API base URL.
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl fmt::Debug for SendGridConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendGridConfig")
            .field("api_key", &"[redacted]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Delivery handler for the SendGrid v3 mail API.
///
/// The whole `Message` goes out in a single request.
pub struct SendGridHandler {
    config: SendGridConfig,
    client: Client,
}

impl SendGridHandler {
    /// Create a new SendGrid handler.
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

// SendGrid API request/response structures

#[derive(Debug, Serialize)]
struct SendGridRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendGridError {
    errors: Vec<SendGridErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SendGridErrorDetail {
    message: String,
}

impl<'a> From<&'a Message> for SendGridRequest<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            personalizations: vec![Personalization {
                to: vec![EmailAddress { email: &message.to }],
            }],
            from: EmailAddress {
                email: &message.from,
            },
            subject: &message.subject,
            // SendGrid requires text/plain before text/html
            content: vec![
                Content {
                    content_type: "text/plain",
                    value: &message.text,
                },
                Content {
                    content_type: "text/html",
                    value: &message.html,
                },
            ],
        }
    }
}

#[async_trait]
impl DeliveryHandler for SendGridHandler {
    async fn send(&self, message: &Message) -> MailerResult<SentEmail> {
        let request = SendGridRequest::from(message);

        debug!(
            to = %message.to,
            subject = %message.subject,
            "Sending email via SendGrid"
        );

        let response = self
            .client
            .post(format!("{}/mail/send", self.config.api_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let message_id = response
            .headers()
            .get("x-message-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if status.is_success() {
            info!(
                to = %message.to,
                message_id = ?message_id,
                "Email sent successfully via SendGrid"
            );
            return Ok(SentEmail {
                message_id,
                accepted: true,
            });
        }

        let error_body = response.text().await.unwrap_or_default();
        error!(
            to = %message.to,
            status = %status,
            error = %error_body,
            "Failed to send email via SendGrid"
        );

        let error_message = match serde_json::from_str::<SendGridError>(&error_body) {
            Ok(sg_error) => sg_error
                .errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join(", "),
            Err(_) => error_body,
        };

        Err(MailerError::Delivery(format!(
            "SendGrid error ({}): {}",
            status, error_message
        )))
    }

    fn name(&self) -> &'static str {
        "SendGrid"
    }
}
