//! Error types for the mailer domain.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for mailer operations.
pub type MailerResult<T> = Result<T, MailerError>;

/// Errors that can occur while configuring, rendering, or delivering mail.
#[derive(Debug, Error)]
pub enum MailerError {
    /// Initialization was attempted with an unusable configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A template file was not present when a send needed it.
    #[error("Template not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    /// A template could not be read, parsed, or evaluated.
    #[error("Template rendering error: {0}")]
    Template(String),

    /// The active delivery handler reported a failure.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Caller-supplied arguments violate a precondition.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A reserved method name was routed through `Mailer::invoke`.
    #[error("'{0}' is a reserved method and cannot be invoked on an initialized mailer")]
    ReservedMethod(String),
}

impl From<core_config::ConfigError> for MailerError {
    fn from(err: core_config::ConfigError) -> Self {
        MailerError::Configuration(err.to_string())
    }
}

impl From<minijinja::Error> for MailerError {
    fn from(err: minijinja::Error) -> Self {
        MailerError::Template(err.to_string())
    }
}

impl From<reqwest::Error> for MailerError {
    fn from(err: reqwest::Error) -> Self {
        MailerError::Delivery(err.to_string())
    }
}

impl From<serde_json::Error> for MailerError {
    fn from(err: serde_json::Error) -> Self {
        MailerError::InvalidInput(err.to_string())
    }
}

impl From<std::io::Error> for MailerError {
    fn from(err: std::io::Error) -> Self {
        MailerError::Template(format!("IO error: {}", err))
    }
}
