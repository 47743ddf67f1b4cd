//! Mailer CLI
//!
//! Initializes a `Mailer` from the environment (or a JSON config file) and
//! invokes one method on it:
//!
//! ```text
//! mailer send welcome ada@example.com "Welcome!" '{"name": "Ada"}'
//! mailer welcome ada@example.com "Welcome!" '{"name": "Ada"}'
//! mailer --dry-run --config mailer.json welcome ada@example.com "Welcome!" '{}'
//! ```

use clap::Parser;
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_mailer::{Mailer, MailerConfig};
use eyre::{Result, WrapErr};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "mailer")]
#[command(about = "Render and send templated transactional email")]
pub struct Cli {
    /// JSON configuration file. Defaults to environment variables.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Compose the message without delivering it
    #[arg(long)]
    pub dry_run: bool,

    /// `send`, or the name of a template
    pub method: String,

    /// Method arguments. Valid JSON objects and arrays are parsed, anything else is a string.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

pub async fn run() -> Result<()> {
    install_color_eyre();
    init_tracing(&Environment::from_env());

    let cli = Cli::parse();
    let output = execute(cli).await?;
    println!("{}", output);

    Ok(())
}

/// Run one CLI invocation and return the outcome as pretty JSON.
pub async fn execute(cli: Cli) -> Result<String> {
    let mut config = load_config(cli.config.as_deref()).await?;
    if cli.dry_run {
        config.dry_run = true;
    }

    let mailer = Mailer::initialize(config).wrap_err("Failed to initialize mailer")?;

    let args: Vec<Value> = cli.args.iter().map(|raw| parse_arg(raw)).collect();

    info!(method = %cli.method, handler = mailer.handler_name(), "Invoking mailer");

    let outcome = mailer
        .invoke(&cli.method, args)
        .await
        .wrap_err_with(|| format!("'{}' failed", cli.method))?;

    Ok(serde_json::to_string_pretty(&outcome)?)
}

/// Read a JSON config file, or fall back to environment variables.
pub async fn load_config(path: Option<&Path>) -> Result<MailerConfig> {
    match path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .wrap_err_with(|| format!("Invalid mailer config in {}", path.display()))
        }
        None => MailerConfig::from_env().wrap_err("Failed to load mailer config from environment"),
    }
}

/// Objects and arrays are JSON; everything else, including text that only
/// looks like JSON (`[Acme] Welcome`), is a plain string.
pub fn parse_arg(raw: &str) -> Value {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(raw) {
            return value;
        }
    }
    Value::String(raw.to_string())
}
