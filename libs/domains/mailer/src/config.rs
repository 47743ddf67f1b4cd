//! Mailer configuration and credential resolution.

use crate::error::{MailerError, MailerResult};
use crate::providers::{SendGridConfig, SesConfig};
use crate::templates::DEFAULT_TEMPLATE_EXTENSION;
use core_config::{env_flag, env_optional, env_or_default, ConfigError, Environment, FromEnv};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Everything needed to initialize a `Mailer`.
///
/// Deserializes from the camelCase object shape
/// (`sendGridAPIKey`, `sesKey`, `sesSecret`, `defaultFromAddress`, `templatePath`).
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MailerConfig {
    /// API key for the SendGrid handler.
    #[serde(rename = "sendGridAPIKey", default)]
    pub sendgrid_api_key: Option<String>,
    /// Access key id for the SES handler.
    #[serde(default)]
    pub ses_key: Option<String>,
    /// Secret access key for the SES handler.
    #[serde(default)]
    pub ses_secret: Option<String>,
    /// AWS region for SES (defaults to `us-east-1`).
    #[serde(default)]
    pub ses_region: Option<String>,
    /// Sender used for every message.
    pub default_from_address: String,
    /// Template directory, absolute or relative to the project root.
    pub template_path: String,
    /// File extension of template files.
    #[serde(default = "default_template_extension")]
    pub template_extension: String,
    /// Compose messages without handing them to the delivery handler.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// SendGrid API base URL override.
    #[serde(rename = "sendGridAPIUrl", default)]
    pub sendgrid_api_url: Option<String>,
    /// SES endpoint override.
    #[serde(default)]
    pub ses_endpoint_url: Option<String>,
}

fn default_template_extension() -> String {
    DEFAULT_TEMPLATE_EXTENSION.to_string()
}

fn default_dry_run() -> bool {
    Environment::from_env().is_test()
}

impl MailerConfig {
    /// Minimal configuration; credentials are added with the builder methods.
    pub fn new(default_from_address: impl Into<String>, template_path: impl Into<String>) -> Self {
        Self {
            sendgrid_api_key: None,
            ses_key: None,
            ses_secret: None,
            ses_region: None,
            default_from_address: default_from_address.into(),
            template_path: template_path.into(),
            template_extension: default_template_extension(),
            dry_run: default_dry_run(),
            sendgrid_api_url: None,
            ses_endpoint_url: None,
        }
    }

    pub fn with_sendgrid(mut self, api_key: impl Into<String>) -> Self {
        self.sendgrid_api_key = Some(api_key.into());
        self
    }

    pub fn with_ses(mut self, key: impl Into<String>, secret: impl Into<String>) -> Self {
        self.ses_key = Some(key.into());
        self.ses_secret = Some(secret.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_template_extension(mut self, extension: impl Into<String>) -> Self {
        self.template_extension = extension.into();
        self
    }

    /// Pick the delivery credentials. SendGrid wins when both forms are present.
    pub fn credentials(&self) -> MailerResult<Credentials> {
        let present = |value: &Option<String>| value.as_deref().filter(|v| !v.trim().is_empty()).map(str::to_string);

        if let Some(api_key) = present(&self.sendgrid_api_key) {
            let mut config = SendGridConfig::new(api_key);
            if let Some(url) = &self.sendgrid_api_url {
                config = config.with_api_url(url.as_str());
            }
            return Ok(Credentials::SendGrid(config));
        }

        match (present(&self.ses_key), present(&self.ses_secret)) {
            (Some(key), Some(secret)) => {
                let mut config = SesConfig::new(key, secret);
                if let Some(region) = present(&self.ses_region) {
                    config = config.with_region(region);
                }
                if let Some(url) = &self.ses_endpoint_url {
                    config = config.with_endpoint_url(url.as_str());
                }
                Ok(Credentials::Ses(config))
            }
            (Some(_), None) => Err(MailerError::Configuration(
                "SES key supplied without an SES secret".to_string(),
            )),
            (None, Some(_)) => Err(MailerError::Configuration(
                "SES secret supplied without an SES key".to_string(),
            )),
            (None, None) => Err(MailerError::Configuration(
                "no delivery credentials: supply a SendGrid API key or an SES key and secret"
                    .to_string(),
            )),
        }
    }

    /// Whether both credential forms were supplied.
    pub fn has_conflicting_credentials(&self) -> bool {
        let set = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        set(&self.sendgrid_api_key) && (set(&self.ses_key) || set(&self.ses_secret))
    }

    /// Check the non-credential fields.
    pub fn validate(&self) -> MailerResult<()> {
        if self.default_from_address.trim().is_empty() {
            return Err(MailerError::Configuration(
                "default from address is required".to_string(),
            ));
        }
        if self.template_path.trim().is_empty() {
            return Err(MailerError::Configuration("template path is required".to_string()));
        }
        if self.template_extension.trim().is_empty() {
            return Err(MailerError::Configuration(
                "template extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute template directory.
    pub fn template_root(&self) -> MailerResult<PathBuf> {
        let path = Path::new(&self.template_path);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(project_root()?.join(path))
    }
}

impl FromEnv for MailerConfig {
    /// Reads from environment variables:
    /// - `SENDGRID_API_KEY`, or `SES_KEY` + `SES_SECRET` (+ optional `SES_REGION`)
    /// - `MAILER_FROM_ADDRESS` (falls back to `EMAIL_FROM_ADDRESS`)
    /// - `MAILER_TEMPLATE_PATH`: defaults to `templates`
    /// - `MAILER_TEMPLATE_EXTENSION`: defaults to `ejs`
    /// - `MAILER_DRY_RUN`: defaults to true when `APP_ENV=test`
    /// - `SENDGRID_API_URL`, `SES_ENDPOINT_URL`: endpoint overrides
    fn from_env() -> Result<Self, ConfigError> {
        let default_from_address = env_optional("MAILER_FROM_ADDRESS")
            .or_else(|| env_optional("EMAIL_FROM_ADDRESS"))
            .ok_or_else(|| ConfigError::MissingEnvVar("MAILER_FROM_ADDRESS".to_string()))?;

        Ok(Self {
            sendgrid_api_key: env_optional("SENDGRID_API_KEY"),
            ses_key: env_optional("SES_KEY"),
            ses_secret: env_optional("SES_SECRET"),
            ses_region: env_optional("SES_REGION"),
            default_from_address,
            template_path: env_or_default("MAILER_TEMPLATE_PATH", "templates"),
            template_extension: env_or_default(
                "MAILER_TEMPLATE_EXTENSION",
                DEFAULT_TEMPLATE_EXTENSION,
            ),
            dry_run: env_flag("MAILER_DRY_RUN")?.unwrap_or_else(default_dry_run),
            sendgrid_api_url: env_optional("SENDGRID_API_URL"),
            ses_endpoint_url: env_optional("SES_ENDPOINT_URL"),
        })
    }
}

impl fmt::Debug for MailerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "[redacted]");
        f.debug_struct("MailerConfig")
            .field("sendgrid_api_key", &redact(&self.sendgrid_api_key))
            .field("ses_key", &self.ses_key)
            .field("ses_secret", &redact(&self.ses_secret))
            .field("ses_region", &self.ses_region)
            .field("default_from_address", &self.default_from_address)
            .field("template_path", &self.template_path)
            .field("template_extension", &self.template_extension)
            .field("dry_run", &self.dry_run)
            .field("sendgrid_api_url", &self.sendgrid_api_url)
            .field("ses_endpoint_url", &self.ses_endpoint_url)
            .finish()
    }
}

/// Which delivery handler the credentials select.
#[derive(Debug, Clone)]
pub enum Credentials {
    SendGrid(SendGridConfig),
    Ses(SesConfig),
}

/// The nearest ancestor of the working directory that holds a `Cargo.toml`,
/// or the working directory itself when there is none.
pub fn project_root() -> MailerResult<PathBuf> {
    let cwd = std::env::current_dir().map_err(|e| {
        MailerError::Configuration(format!("cannot determine working directory: {}", e))
    })?;

    Ok(cwd
        .ancestors()
        .find(|dir| dir.join("Cargo.toml").is_file())
        .map(Path::to_path_buf)
        .unwrap_or(cwd))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> MailerConfig {
        MailerConfig::new("no-reply@test.com", "/srv/templates")
    }

    #[test]
    fn test_no_credentials_is_a_configuration_error() {
        let err = base().credentials().unwrap_err();
        assert!(matches!(err, MailerError::Configuration(ref msg) if msg.contains("no delivery credentials")));
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let err = base().with_sendgrid("  ").credentials().unwrap_err();
        assert!(matches!(err, MailerError::Configuration(_)));
    }

    #[test]
    fn test_sendgrid_credentials() {
        let creds = base().with_sendgrid("SG.key").credentials().unwrap();
        match creds {
            Credentials::SendGrid(config) => assert_eq!(config.api_key, "SG.key"),
            other => panic!("expected SendGrid, got {:?}", other),
        }
    }

    #[test]
    fn test_ses_credentials_with_region() {
        let mut config = base().with_ses("AKID", "secret");
        config.ses_region = Some("eu-west-1".to_string());

        match config.credentials().unwrap() {
            Credentials::Ses(ses) => {
                assert_eq!(ses.key, "AKID");
                assert_eq!(ses.secret, "secret");
                assert_eq!(ses.region, "eu-west-1");
            }
            other => panic!("expected SES, got {:?}", other),
        }
    }

    #[test]
    fn test_half_ses_pair_is_rejected() {
        let mut config = base();
        config.ses_key = Some("AKID".to_string());
        let err = config.credentials().unwrap_err();
        assert!(err.to_string().contains("without an SES secret"));
    }

    #[test]
    fn test_sendgrid_wins_when_both_present() {
        let config = base().with_sendgrid("SG.key").with_ses("AKID", "secret");
        assert!(config.has_conflicting_credentials());
        assert!(matches!(config.credentials().unwrap(), Credentials::SendGrid(_)));
    }

    #[test]
    fn test_validate_requires_from_and_path() {
        assert!(base().validate().is_ok());
        assert!(MailerConfig::new("", "/srv/templates").validate().is_err());
        assert!(MailerConfig::new("a@b.com", " ").validate().is_err());
    }

    #[test]
    fn test_absolute_template_path_is_kept() {
        assert_eq!(base().template_root().unwrap(), PathBuf::from("/srv/templates"));
    }

    #[test]
    fn test_relative_template_path_joins_project_root() {
        let config = MailerConfig::new("a@b.com", "src/templates");
        let root = config.template_root().unwrap();

        assert!(root.is_absolute());
        assert!(root.ends_with("src/templates"));
        assert!(root.parent().unwrap().parent().unwrap().join("Cargo.toml").is_file());
    }

    #[test]
    fn test_deserializes_camel_case_shape() {
        let config: MailerConfig = serde_json::from_value(serde_json::json!({
            "sendGridAPIKey": "SG.key",
            "defaultFromAddress": "no-reply@test.com",
            "templatePath": "src/templates",
            "dryRun": true
        }))
        .unwrap();

        assert_eq!(config.sendgrid_api_key.as_deref(), Some("SG.key"));
        assert_eq!(config.default_from_address, "no-reply@test.com");
        assert_eq!(config.template_extension, "ejs");
        assert!(config.dry_run);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", base().with_sendgrid("SG.key").with_ses("AKID", "hunter2"));
        assert!(!debug.contains("SG.key"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_env_reads_ses_settings() {
        temp_env::with_vars(
            [
                ("SENDGRID_API_KEY", None),
                ("SES_KEY", Some("AKID")),
                ("SES_SECRET", Some("secret")),
                ("SES_REGION", Some("eu-central-1")),
                ("MAILER_FROM_ADDRESS", None),
                ("EMAIL_FROM_ADDRESS", Some("ops@example.com")),
                ("MAILER_TEMPLATE_PATH", Some("/srv/mail")),
                ("MAILER_DRY_RUN", Some("true")),
            ],
            || {
                let config = MailerConfig::from_env().unwrap();

                assert_eq!(config.default_from_address, "ops@example.com");
                assert_eq!(config.template_path, "/srv/mail");
                assert!(config.dry_run);
                assert!(matches!(config.credentials().unwrap(), Credentials::Ses(ref ses) if ses.region == "eu-central-1"));
            },
        );
    }

    #[test]
    fn test_from_env_requires_from_address() {
        temp_env::with_vars(
            [
                ("MAILER_FROM_ADDRESS", None::<&str>),
                ("EMAIL_FROM_ADDRESS", None),
            ],
            || {
                let err = MailerConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("MAILER_FROM_ADDRESS"));
            },
        );
    }

    #[test]
    fn test_from_env_dry_run_follows_app_env() {
        temp_env::with_vars(
            [
                ("MAILER_FROM_ADDRESS", Some("ops@example.com")),
                ("MAILER_DRY_RUN", None),
                ("APP_ENV", Some("test")),
            ],
            || {
                assert!(MailerConfig::from_env().unwrap().dry_run);
            },
        );
    }
}
