//! Data models for the mailer domain.

use crate::providers::SentEmail;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body variant of a template file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    Html,
    Text,
}

impl TemplateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFormat::Html => "html",
            TemplateFormat::Text => "text",
        }
    }
}

impl fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully rendered message, ready for a delivery handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Recipient email address.
    pub to: String,
    /// Sender email address.
    pub from: String,
    /// Subject line.
    pub subject: String,
    /// Rendered HTML body.
    pub html: String,
    /// Rendered plain text body.
    pub text: String,
}

/// What happened to a message handed to `Mailer::send`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Dry-run mode: the message was composed but never left the process.
    DryRun { message: Message },
    /// The delivery handler accepted the message.
    Sent { message: Message, receipt: SentEmail },
}

impl SendOutcome {
    /// The composed message, regardless of whether it was delivered.
    pub fn message(&self) -> &Message {
        match self {
            SendOutcome::DryRun { message } | SendOutcome::Sent { message, .. } => message,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            SendOutcome::DryRun { message } | SendOutcome::Sent { message, .. } => message,
        }
    }

    pub fn receipt(&self) -> Option<&SentEmail> {
        match self {
            SendOutcome::DryRun { .. } => None,
            SendOutcome::Sent { receipt, .. } => Some(receipt),
        }
    }

    pub fn is_dry_run(&self) -> bool {
        matches!(self, SendOutcome::DryRun { .. })
    }
}
