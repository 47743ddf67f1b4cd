//! Mailer Domain
//!
//! Templated transactional email over interchangeable delivery providers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │     Caller      │  ← send("welcome", to, subject, locals) / invoke("welcome", args)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │     Mailer      │  ← renders <name>.html.ejs then <name>.text.ejs
//! └────────┬────────┘
//!          │ (skipped in dry-run mode)
//! ┌────────▼────────┐
//! │ DeliveryHandler │  ← SendGrid (API key) or SES (key + secret)
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_mailer::{Mailer, MailerConfig};
//! use serde_json::json;
//!
//! let mailer = Mailer::initialize(
//!     MailerConfig::new("no-reply@example.com", "templates").with_sendgrid(api_key),
//! )?;
//!
//! mailer.send("welcome", "ada@example.com", "Welcome!", &json!({ "name": "Ada" })).await?;
//!
//! // Any non-reserved method name is a template name
//! mailer.invoke("welcome", vec![json!("ada@example.com"), json!("Welcome!"), json!({ "name": "Ada" })]).await?;
//! ```

pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod providers;
pub mod templates;

// Re-export commonly used types
pub use config::{Credentials, MailerConfig};
pub use error::{MailerError, MailerResult};
pub use mailer::{Mailer, Route, RESERVED_METHODS};
pub use models::{Message, SendOutcome, TemplateFormat};
pub use providers::{DeliveryHandler, RecordingHandler, SendGridHandler, SentEmail, SesHandler};
pub use templates::TemplateRenderer;
