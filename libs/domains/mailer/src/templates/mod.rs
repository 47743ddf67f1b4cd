//! File-backed email template rendering.
//!
//! Templates live at `<root>/<name>.<format>.<extension>` and are read from
//! disk on every render. The syntax is minijinja with `<% %>` delimiters:
//!
//! - Escaped interpolation: `<%= user.name %>`
//! - Raw interpolation: `<%- footer_html %>`
//! - Control flow: `<% if items %>...<% endif %>`, `<% for item in items %>...<% endfor %>`
//! - Comments: `<%# not rendered %>`
//!
//! `<%=` escapes `& < > " '` in both html and text templates, the same set
//! EJS escapes. Use `<%-` for output that must go through untouched.

use crate::error::{MailerError, MailerResult};
use crate::models::TemplateFormat;
use minijinja::syntax::SyntaxConfig;
use minijinja::{escape_formatter, AutoEscape, Environment, Output, State, UndefinedBehavior};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Default file extension for template files.
pub const DEFAULT_TEMPLATE_EXTENSION: &str = "ejs";

/// Renders the html and text variants of named templates from a directory.
#[derive(Clone)]
pub struct TemplateRenderer {
    root: PathBuf,
    extension: String,
    env: Arc<Environment<'static>>,
}

impl TemplateRenderer {
    /// Create a renderer rooted at an absolute template directory.
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> MailerResult<Self> {
        let extension = extension.into();

        let mut env = Environment::new();
        env.set_syntax(
            SyntaxConfig::builder()
                .block_delimiters("<%", "%>")
                .variable_delimiters("<%=", "%>")
                .comment_delimiters("<%#", "%>")
                .build()?,
        );
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        // Escaping is done by the formatter, for every format alike
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_formatter(ejs_formatter);

        Ok(Self {
            root: root.into(),
            extension,
            env: Arc::new(env),
        })
    }

    /// The directory templates are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the file backing `(format, name)`.
    pub fn template_path(&self, format: TemplateFormat, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}.{}", name, format, self.extension))
    }

    /// Read and render one variant of a template.
    ///
    /// Existence is checked before the read; a file removed in between
    /// surfaces as a `Template` I/O error rather than `TemplateNotFound`.
    pub async fn render(
        &self,
        format: TemplateFormat,
        name: &str,
        locals: &Value,
    ) -> MailerResult<String> {
        validate_name(name)?;
        if !locals.is_object() {
            return Err(MailerError::InvalidInput(format!(
                "template locals must be an object, got {}",
                json_kind(locals)
            )));
        }

        let path = self.template_path(format, name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(MailerError::TemplateNotFound(path));
        }

        let source = tokio::fs::read_to_string(&path).await?;
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(template = %file_name, "Rendering template");

        let source = rewrite_raw_tags(&source);
        Ok(self.env.render_named_str(&file_name, &source, locals)?)
    }
}

/// Writes interpolated values escaped, except values already marked safe.
/// `none` renders as an empty string.
fn ejs_formatter(
    out: &mut Output<'_>,
    state: &State<'_, '_>,
    value: &minijinja::Value,
) -> Result<(), minijinja::Error> {
    if value.is_safe() {
        return escape_formatter(out, state, value);
    }
    if value.is_none() || value.is_undefined() {
        return Ok(());
    }
    out.write_str(&escape_html(&value.to_string()))?;
    Ok(())
}

fn escape_html(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(raw);
    }

    let mut escaped = String::with_capacity(raw.len() + 16);
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Rewrite `<%- expr %>` as `<%= (expr) | safe %>`.
///
/// Left alone, `<%-` would read as a whitespace-trimming block tag. A
/// trailing `-%>` keeps its trimming meaning.
fn rewrite_raw_tags(source: &str) -> Cow<'_, str> {
    if !source.contains("<%-") {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len() + 32);
    let mut rest = source;
    while let Some(start) = rest.find("<%-") {
        out.push_str(&rest[..start]);
        let tag = &rest[start + 3..];
        let Some(end) = tag.find("%>") else {
            // Unterminated; the parser reports it
            out.push_str(&rest[start..]);
            return Cow::Owned(out);
        };

        let inner = &tag[..end];
        let (expr, close) = match inner.strip_suffix('-') {
            Some(expr) => (expr, "-%>"),
            None => (inner, "%>"),
        };
        let _ = write!(out, "<%= ({}) | safe {}", expr.trim(), close);
        rest = &tag[end + 2..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn validate_name(name: &str) -> MailerResult<()> {
    if name.trim().is_empty() {
        return Err(MailerError::InvalidInput("template name is empty".to_string()));
    }
    if name.contains(['/', '\\']) || name == ".." {
        return Err(MailerError::InvalidInput(format!(
            "template name '{}' must not contain path separators",
            name
        )));
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
