//! The dispatcher: renders templates and routes messages to a delivery handler.

use crate::config::{Credentials, MailerConfig};
use crate::error::{MailerError, MailerResult};
use crate::models::{Message, SendOutcome, TemplateFormat};
use crate::providers::{DeliveryHandler, SendGridHandler, SesHandler};
use crate::templates::TemplateRenderer;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const INITIALIZE: &str = "initialize";
const SEND: &str = "send";

/// Method names that `invoke` never treats as template names.
pub const RESERVED_METHODS: &[&str] = &[INITIALIZE, SEND];

/// Where `invoke` sends a method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Initialize,
    Send,
    Template(&'a str),
}

/// Renders templated email and hands it to the configured delivery handler.
///
/// Built once by `Mailer::initialize` and immutable afterwards; clones share
/// the same renderer and handler.
#[derive(Clone)]
pub struct Mailer {
    from_address: Arc<str>,
    renderer: TemplateRenderer,
    handler: Arc<dyn DeliveryHandler>,
    dry_run: bool,
}

impl Mailer {
    /// Validate the configuration and build the handler its credentials select.
    pub fn initialize(config: MailerConfig) -> MailerResult<Self> {
        if config.has_conflicting_credentials() {
            warn!("Both SendGrid and SES credentials supplied, using SendGrid");
        }

        let handler: Arc<dyn DeliveryHandler> = match config.credentials()? {
            Credentials::SendGrid(sendgrid) => Arc::new(SendGridHandler::new(sendgrid)),
            Credentials::Ses(ses) => Arc::new(SesHandler::new(ses)),
        };

        Self::with_handler(config, handler)
    }

    /// Build a mailer around an explicit handler, ignoring any credentials.
    pub fn with_handler(
        config: MailerConfig,
        handler: Arc<dyn DeliveryHandler>,
    ) -> MailerResult<Self> {
        config.validate()?;

        let renderer = TemplateRenderer::new(config.template_root()?, config.template_extension)?;

        info!(
            handler = handler.name(),
            template_root = %renderer.root().display(),
            dry_run = config.dry_run,
            "Mailer initialized"
        );

        Ok(Self {
            from_address: config.default_from_address.into(),
            renderer,
            handler,
            dry_run: config.dry_run,
        })
    }

    pub fn from_address(&self) -> &str {
        &self.from_address
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler.name()
    }

    pub fn renderer(&self) -> &TemplateRenderer {
        &self.renderer
    }

    /// Render `template` for `to` and deliver it.
    ///
    /// The html variant is rendered before the text variant. In dry-run mode
    /// the composed message is returned without touching the handler.
    #[instrument(skip(self, locals), fields(handler = self.handler.name()))]
    pub async fn send(
        &self,
        template: &str,
        to: &str,
        subject: &str,
        locals: &Value,
    ) -> MailerResult<SendOutcome> {
        if to.trim().is_empty() {
            return Err(MailerError::InvalidInput("recipient is empty".to_string()));
        }
        if subject.trim().is_empty() {
            return Err(MailerError::InvalidInput("subject is empty".to_string()));
        }

        let html = self.renderer.render(TemplateFormat::Html, template, locals).await?;
        let text = self.renderer.render(TemplateFormat::Text, template, locals).await?;

        let message = Message {
            to: to.to_string(),
            from: self.from_address.to_string(),
            subject: subject.to_string(),
            html,
            text,
        };

        if self.dry_run {
            debug!("Dry run, message not delivered");
            return Ok(SendOutcome::DryRun { message });
        }

        let receipt = self.handler.send(&message).await?;
        Ok(SendOutcome::Sent { message, receipt })
    }

    /// Classify a method name. Reserved names are checked first; anything
    /// else names a template.
    pub fn route(method: &str) -> Route<'_> {
        match method {
            INITIALIZE => Route::Initialize,
            SEND => Route::Send,
            template => Route::Template(template),
        }
    }

    /// Call a method by name with JSON arguments.
    ///
    /// - `send`: `[template, to, subject, locals]`
    /// - `initialize`: rejected, a `Mailer` is already initialized
    /// - any other name: `[to, subject, locals]`, sent with that name as the template
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> MailerResult<SendOutcome> {
        match Self::route(method) {
            Route::Initialize => Err(MailerError::ReservedMethod(method.to_string())),
            Route::Send => {
                let (template, to, subject, locals): (String, String, String, Value) =
                    parse_args(method, args)?;
                self.send(&template, &to, &subject, &locals).await
            }
            Route::Template(template) => {
                let (to, subject, locals): (String, String, Value) = parse_args(method, args)?;
                self.send(template, &to, &subject, &locals).await
            }
        }
    }
}

fn parse_args<T: DeserializeOwned>(method: &str, args: Vec<Value>) -> MailerResult<T> {
    serde_json::from_value(Value::Array(args))
        .map_err(|e| MailerError::InvalidInput(format!("bad arguments for '{}': {}", method, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::RecordingHandler;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixture(dry_run: bool) -> (TempDir, RecordingHandler, Mailer) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("test.html.ejs"),
            "This is a <%= adjective %> html test.",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("test.text.ejs"),
            "This is a <%= adjective %> text test.",
        )
        .unwrap();

        let config = MailerConfig::new("no-reply@test.com", dir.path().to_string_lossy())
            .with_dry_run(dry_run);
        let handler = RecordingHandler::new();
        let mailer = Mailer::with_handler(config, Arc::new(handler.clone())).unwrap();
        (dir, handler, mailer)
    }

    #[test]
    fn test_route_checks_reserved_names_first() {
        assert_eq!(Mailer::route("initialize"), Route::Initialize);
        assert_eq!(Mailer::route("send"), Route::Send);
        assert_eq!(Mailer::route("welcome"), Route::Template("welcome"));
        for name in RESERVED_METHODS {
            assert!(!matches!(Mailer::route(name), Route::Template(_)));
        }
    }

    #[test]
    fn test_initialize_rejects_empty_from_address() {
        let config = MailerConfig::new(" ", "/srv/templates").with_sendgrid("SG.key");

        let err = Mailer::initialize(config).err().unwrap();

        assert!(matches!(err, MailerError::Configuration(ref msg) if msg.contains("from address")));
    }

    #[tokio::test]
    async fn test_dry_run_skips_handler() {
        let (_dir, handler, mailer) = fixture(true);

        let outcome = mailer
            .send("test", "a@b.com", "Subj", &json!({ "adjective": "great" }))
            .await
            .unwrap();

        assert!(outcome.is_dry_run());
        assert_eq!(outcome.message().from, "no-reply@test.com");
        assert_eq!(handler.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_live_send_reaches_handler() {
        let (_dir, handler, mailer) = fixture(false);

        let outcome = mailer
            .send("test", "a@b.com", "Subj", &json!({ "adjective": "great" }))
            .await
            .unwrap();

        assert_eq!(outcome.receipt().unwrap().message_id.as_deref(), Some("recorded-1"));
        let sent = handler.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0], outcome.message());
    }

    #[tokio::test]
    async fn test_empty_recipient_or_subject_is_rejected() {
        let (_dir, _handler, mailer) = fixture(true);
        let locals = json!({ "adjective": "great" });

        assert!(matches!(
            mailer.send("test", "", "Subj", &locals).await,
            Err(MailerError::InvalidInput(_))
        ));
        assert!(matches!(
            mailer.send("test", "a@b.com", "  ", &locals).await,
            Err(MailerError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_invoke_initialize_is_reserved() {
        let (_dir, _handler, mailer) = fixture(true);

        let err = mailer.invoke("initialize", vec![json!({})]).await.unwrap_err();

        assert!(matches!(err, MailerError::ReservedMethod(ref m) if m == "initialize"));
    }

    #[tokio::test]
    async fn test_invoke_with_wrong_arity_is_invalid_input() {
        let (_dir, _handler, mailer) = fixture(true);

        let err = mailer
            .invoke("test", vec![json!("a@b.com"), json!("Subj")])
            .await
            .unwrap_err();

        assert!(matches!(err, MailerError::InvalidInput(ref m) if m.contains("'test'")));
    }
}
