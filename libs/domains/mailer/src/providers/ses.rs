//! AWS SES delivery handler.
//!
//! Authenticates with an explicit access key / secret pair and sends through
//! the SES v2 `SendEmail` operation.

use super::{DeliveryHandler, SentEmail};
use crate::error::{MailerError, MailerResult};
use crate::models::Message;
use async_trait::async_trait;
use aws_sdk_sesv2::config::retry::RetryConfig;
use aws_sdk_sesv2::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_sesv2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sesv2::operation::send_email::{SendEmailError, SendEmailOutput};
use aws_sdk_sesv2::types::{Body, Content, Destination, EmailContent};
use aws_sdk_sesv2::Client;
use std::fmt;
use tracing::{debug, error, info};

/// Region used when none is configured.
pub const DEFAULT_SES_REGION: &str = "us-east-1";

/// SES configuration.
#[derive(Clone)]
pub struct SesConfig {
    /// AWS access key id.
    pub key: String,
    /// AWS secret access key.
    pub secret: String,
    /// AWS region hosting the SES identity.
    pub region: String,
    /// Endpoint override (local fakes, VPC endpoints).
    pub endpoint_url: Option<String>,
}

impl SesConfig {
    pub fn new(key: String, secret: String) -> Self {
        Self {
            key,
            secret,
            region: DEFAULT_SES_REGION.to_string(),
            endpoint_url: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }
}

impl fmt::Debug for SesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SesConfig")
            .field("key", &self.key)
            .field("secret", &"[redacted]")
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}

/// The message as SES names its parts: the HTML body is the `message`
/// and the plain text body is the `alt_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SesRequest {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub message: String,
    pub alt_text: String,
}

impl From<&Message> for SesRequest {
    fn from(message: &Message) -> Self {
        Self {
            to: message.to.clone(),
            from: message.from.clone(),
            subject: message.subject.clone(),
            message: message.html.clone(),
            alt_text: message.text.clone(),
        }
    }
}

/// Delivery handler for AWS SES.
pub struct SesHandler {
    client: Client,
    region: String,
}

impl SesHandler {
    /// Create a new SES handler.
    ///
    /// Retries are disabled; a failed call surfaces immediately.
    pub fn new(config: SesConfig) -> Self {
        let credentials = Credentials::new(
            config.key.clone(),
            config.secret.clone(),
            None, // session token
            None, // expiry
            "domain-mailer",
        );

        let mut builder = aws_sdk_sesv2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }

        Self {
            client: Client::from_conf(builder.build()),
            region: config.region,
        }
    }

    async fn dispatch(&self, request: &SesRequest) -> MailerResult<SentEmail> {
        let utf8 = |data: &str| {
            Content::builder()
                .data(data)
                .charset("UTF-8")
                .build()
                .map_err(|e| MailerError::Delivery(format!("Invalid SES content: {}", e)))
        };

        let body = Body::builder()
            .html(utf8(&request.message)?)
            .text(utf8(&request.alt_text)?)
            .build();

        let content = EmailContent::builder()
            .simple(
                aws_sdk_sesv2::types::Message::builder()
                    .subject(utf8(&request.subject)?)
                    .body(body)
                    .build(),
            )
            .build();

        let outcome = self
            .client
            .send_email()
            .from_email_address(&request.from)
            .destination(Destination::builder().to_addresses(&request.to).build())
            .content(content)
            .send()
            .await;

        settle(outcome)
    }
}

/// Collapse the SDK completion (service error, output, raw response) into a
/// single delivery result.
fn settle(outcome: Result<SendEmailOutput, SdkError<SendEmailError>>) -> MailerResult<SentEmail> {
    match outcome {
        Ok(output) => Ok(SentEmail {
            message_id: output.message_id().map(str::to_string),
            accepted: true,
        }),
        Err(err) => {
            let status = err.raw_response().map(|response| response.status().as_u16());
            let detail = match err.as_service_error() {
                Some(service_err) => format!(
                    "{}: {}",
                    service_err.code().unwrap_or("Unknown"),
                    service_err.message().unwrap_or("no message")
                ),
                None => DisplayErrorContext(&err).to_string(),
            };

            Err(MailerError::Delivery(match status {
                Some(status) => format!("SES error ({}): {}", status, detail),
                None => format!("SES error: {}", detail),
            }))
        }
    }
}

#[async_trait]
impl DeliveryHandler for SesHandler {
    async fn send(&self, message: &Message) -> MailerResult<SentEmail> {
        let request = SesRequest::from(message);

        debug!(
            to = %request.to,
            subject = %request.subject,
            region = %self.region,
            "Sending email via SES"
        );

        match self.dispatch(&request).await {
            Ok(sent) => {
                info!(
                    to = %request.to,
                    message_id = ?sent.message_id,
                    "Email sent successfully via SES"
                );
                Ok(sent)
            }
            Err(err) => {
                error!(to = %request.to, error = %err, "Failed to send email via SES");
                Err(err)
            }
        }
    }

    fn name(&self) -> &'static str {
        "SES"
    }
}
