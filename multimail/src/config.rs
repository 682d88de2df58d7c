//! Service configuration.
//!
//! A [`MailServiceConfig`] can be built in code, deserialized from JSON or
//! TOML, or read from prefixed environment variables:
//!
//! ```rust,ignore
//! use multimail::MailServiceConfig;
//!
//! let config = MailServiceConfig::from_file("mail.toml")?;
//! let config = MailServiceConfig::from_env("MAIL")?; // MAIL_FROM_USERNAME, ...
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::{MailError, Result, ServiceProvider, SmtpSecurity};

/// Default ceiling for each of the To, Cc and Bcc lists.
pub const DEFAULT_MAX_RECIPIENTS: usize = 50;

/// Default AWS SES endpoint.
pub const AWS_SES_DEFAULT_ENDPOINT: &str = "https://email.us-east-1.amazonaws.com";

/// Default AWS SES region.
pub const AWS_SES_DEFAULT_REGION: &str = "us-east-1";

/// Maximum recipient counts per list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientLimits {
    /// Ceiling for To recipients.
    pub to: usize,
    /// Ceiling for Cc recipients.
    pub cc: usize,
    /// Ceiling for Bcc recipients.
    pub bcc: usize,
}

impl RecipientLimits {
    /// Create limits with explicit ceilings.
    pub fn new(to: usize, cc: usize, bcc: usize) -> Self {
        Self { to, cc, bcc }
    }
}

impl Default for RecipientLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECIPIENTS, DEFAULT_MAX_RECIPIENTS, DEFAULT_MAX_RECIPIENTS)
    }
}

/// Configuration used to start up a [`MailService`](crate::MailService).
///
/// A provider is only started when all of its credential fields are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailServiceConfig {
    /// Sender username, e.g. `no-reply`.
    pub from_username: String,
    /// Sender domain, e.g. `example.com`.
    pub from_domain: String,
    /// Sender display name, e.g. `No Reply`.
    pub from_name: String,
    /// Default stylesheet handed to new emails.
    pub email_css: String,

    /// Default for [`Email::auto_text`](crate::Email::auto_text).
    pub auto_text: bool,
    /// Default for [`Email::important`](crate::Email::important).
    pub important: bool,
    /// Default for [`Email::track_clicks`](crate::Email::track_clicks).
    pub track_clicks: bool,
    /// Default for [`Email::track_opens`](crate::Email::track_opens).
    pub track_opens: bool,

    /// AWS IAM access id for SES.
    pub aws_ses_access_id: String,
    /// AWS IAM secret key for SES.
    pub aws_ses_secret_key: String,
    /// SES endpoint, defaults to [`AWS_SES_DEFAULT_ENDPOINT`].
    pub aws_ses_endpoint: String,
    /// SES region, defaults to [`AWS_SES_DEFAULT_REGION`].
    pub aws_ses_region: String,

    /// Mandrill API key.
    pub mandrill_api_key: String,

    /// Postmark server token.
    pub postmark_server_token: String,

    /// SMTP host.
    pub smtp_host: String,
    /// SMTP port, `0` selects the default for the security mode.
    pub smtp_port: u16,
    /// SMTP username.
    pub smtp_username: String,
    /// SMTP password.
    pub smtp_password: String,
    /// SMTP connection security.
    pub smtp_security: SmtpSecurity,

    /// Ceiling for To recipients, defaults to 50 at startup.
    pub max_to_recipients: Option<usize>,
    /// Ceiling for Cc recipients, defaults to 50 at startup.
    pub max_cc_recipients: Option<usize>,
    /// Ceiling for Bcc recipients, defaults to 50 at startup.
    pub max_bcc_recipients: Option<usize>,
}

impl MailServiceConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender username and domain.
    pub fn from(mut self, username: impl Into<String>, domain: impl Into<String>) -> Self {
        self.from_username = username.into();
        self.from_domain = domain.into();
        self
    }

    /// Set the sender display name.
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }

    /// Set the default stylesheet.
    pub fn email_css(mut self, css: impl Into<String>) -> Self {
        self.email_css = css.into();
        self
    }

    /// Set the Mandrill API key.
    pub fn mandrill(mut self, api_key: impl Into<String>) -> Self {
        self.mandrill_api_key = api_key.into();
        self
    }

    /// Set the AWS SES credentials.
    pub fn aws_ses(mut self, access_id: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.aws_ses_access_id = access_id.into();
        self.aws_ses_secret_key = secret_key.into();
        self
    }

    /// Set the AWS SES region.
    pub fn aws_ses_region(mut self, region: impl Into<String>) -> Self {
        self.aws_ses_region = region.into();
        self
    }

    /// Set the Postmark server token.
    pub fn postmark(mut self, server_token: impl Into<String>) -> Self {
        self.postmark_server_token = server_token.into();
        self
    }

    /// Set the SMTP relay and credentials.
    pub fn smtp(
        mut self,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.smtp_host = host.into();
        self.smtp_port = port;
        self.smtp_username = username.into();
        self.smtp_password = password.into();
        self
    }

    /// Set the SMTP security mode.
    pub fn smtp_security(mut self, security: SmtpSecurity) -> Self {
        self.smtp_security = security;
        self
    }

    /// Set all three recipient ceilings.
    pub fn max_recipients(mut self, to: usize, cc: usize, bcc: usize) -> Self {
        self.max_to_recipients = Some(to);
        self.max_cc_recipients = Some(cc);
        self.max_bcc_recipients = Some(bcc);
        self
    }

    /// Set the default flags copied to new emails.
    pub fn defaults(mut self, auto_text: bool, important: bool, track_clicks: bool, track_opens: bool) -> Self {
        self.auto_text = auto_text;
        self.important = important;
        self.track_clicks = track_clicks;
        self.track_opens = track_opens;
        self
    }

    /// The recipient ceilings, with unset ones at their default.
    pub fn recipient_limits(&self) -> RecipientLimits {
        RecipientLimits {
            to: self.max_to_recipients.unwrap_or(DEFAULT_MAX_RECIPIENTS),
            cc: self.max_cc_recipients.unwrap_or(DEFAULT_MAX_RECIPIENTS),
            bcc: self.max_bcc_recipients.unwrap_or(DEFAULT_MAX_RECIPIENTS),
        }
    }

    /// Check if every credential `provider` needs is set.
    pub fn has_credentials(&self, provider: ServiceProvider) -> bool {
        match provider {
            ServiceProvider::Mandrill => !self.mandrill_api_key.is_empty(),
            ServiceProvider::AwsSes => {
                !self.aws_ses_access_id.is_empty() && !self.aws_ses_secret_key.is_empty()
            }
            ServiceProvider::Postmark => !self.postmark_server_token.is_empty(),
            ServiceProvider::Smtp => {
                !self.smtp_host.is_empty() && !self.smtp_username.is_empty() && !self.smtp_password.is_empty()
            }
        }
    }

    /// The sender address, `username@domain`.
    pub fn from_address(&self) -> String {
        format!("{}@{}", self.from_username, self.from_domain)
    }

    /// SES endpoint, falling back to the default.
    pub fn ses_endpoint(&self) -> &str {
        non_empty_or(&self.aws_ses_endpoint, AWS_SES_DEFAULT_ENDPOINT)
    }

    /// SES region, falling back to the default.
    pub fn ses_region(&self) -> &str {
        non_empty_or(&self.aws_ses_region, AWS_SES_DEFAULT_REGION)
    }

    /// Parse a configuration from JSON.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a configuration from TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a configuration file, choosing the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| MailError::Config("No file extension found".to_string()))?;

        let content = std::fs::read_to_string(path)
            .map_err(|e| MailError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        match ext.to_lowercase().as_str() {
            "json" => Self::from_json_str(&content),
            "toml" => Self::from_toml_str(&content),
            other => Err(MailError::Config(format!("Unsupported format: {}", other))),
        }
    }

    /// Load a configuration from `{PREFIX}_{FIELD}` environment variables.
    ///
    /// Field names are upper-cased, so `from_username` is read from
    /// `MAIL_FROM_USERNAME` when the prefix is `MAIL`. Unset variables keep
    /// their defaults.
    pub fn from_env(prefix: &str) -> Result<Self> {
        Self::from_vars(prefix, env::vars())
    }

    /// Load `.env` (if present) into the environment, then call [`Self::from_env`].
    pub fn from_dotenv(prefix: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env(prefix)
    }

    fn from_vars(prefix: &str, vars: impl Iterator<Item = (String, String)>) -> Result<Self> {
        let prefix = format!("{}_", prefix.trim_end_matches('_').to_uppercase());
        let mut map = serde_json::Map::new();

        for (key, value) in vars {
            let Some(field) = key.strip_prefix(&prefix) else {
                continue;
            };
            let field = field.to_lowercase();
            let value = match field.as_str() {
                "auto_text" | "important" | "track_clicks" | "track_opens" => {
                    serde_json::Value::Bool(parse_bool(&key, &value)?)
                }
                "smtp_port" | "max_to_recipients" | "max_cc_recipients" | "max_bcc_recipients" => {
                    let number: u64 = value.trim().parse().map_err(|_| {
                        MailError::Config(format!("{} must be a number, got {:?}", key, value))
                    })?;
                    serde_json::Value::from(number)
                }
                _ => serde_json::Value::String(value),
            };
            map.insert(field, value);
        }

        Ok(serde_json::from_value(serde_json::Value::Object(map))?)
    }
}

fn non_empty_or<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() { default } else { value }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(MailError::Config(format!("{} must be a boolean, got {:?}", key, value))),
    }
}
