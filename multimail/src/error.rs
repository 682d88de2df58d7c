//! Mail error types.

use thiserror::Error;

use crate::ServiceProvider;

/// Result type for mail operations.
pub type Result<T> = std::result::Result<T, MailError>;

/// Opaque error returned by a provider client.
///
/// These are surfaced as [`MailError::Transport`] without reclassification.
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Mail errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// The sender username was not configured.
    #[error("missing required field: from_username")]
    MissingFromUsername,

    /// The sender domain was not configured.
    #[error("missing required field: from_domain")]
    MissingFromDomain,

    /// Startup finished but no provider had usable credentials.
    #[error(
        "attempted to startup the email service provider(s) however there's no available service provider"
    )]
    NoServiceProvider,

    /// The email has no subject.
    #[error("email is missing a subject")]
    MissingSubject,

    /// The email has neither a plain text nor an HTML body.
    #[error("email is missing content (plain & html)")]
    MissingContent,

    /// The email has no primary recipient.
    #[error("email is missing a recipient")]
    MissingRecipient,

    /// Too many To recipients.
    #[error("max TO recipient limit of {limit} reached: {count}")]
    MaxToRecipientsReached {
        /// Configured ceiling.
        limit: usize,
        /// Actual recipient count.
        count: usize,
    },

    /// Too many Cc recipients.
    #[error("max CC recipient limit of {limit} reached: {count}")]
    MaxCcRecipientsReached {
        /// Configured ceiling.
        limit: usize,
        /// Actual recipient count.
        count: usize,
    },

    /// Too many Bcc recipients.
    #[error("max BCC recipient limit of {limit} reached: {count}")]
    MaxBccRecipientsReached {
        /// Configured ceiling.
        limit: usize,
        /// Actual recipient count.
        count: usize,
    },

    /// The requested provider is not in the set of available providers.
    #[error(
        "service provider {provider} was not in the list of available service providers {available:?}, email not sent"
    )]
    ProviderNotAvailable {
        /// The provider that was requested.
        provider: ServiceProvider,
        /// The providers that passed startup.
        available: Vec<ServiceProvider>,
    },

    /// The sender address has no domain part.
    #[error("invalid FromAddress, domain not found using: {0}")]
    InvalidFromAddress(String),

    /// The transport call succeeded but the response signals a failure.
    #[error("{provider} did not return expected valid response: {response}")]
    InvalidProviderResponse {
        /// Provider that produced the response.
        provider: ServiceProvider,
        /// Raw response body.
        response: String,
    },

    /// Mandrill reported a non-success status for a recipient.
    #[error("message status was {status} and not sent - given reason: {reason}")]
    MessageNotSent {
        /// Status reported by the provider.
        status: String,
        /// Rejection reason, empty when none was given.
        reason: String,
    },

    /// Postmark answered with a non-zero error code.
    #[error("error from postmark: {message} error code: {code}")]
    PostmarkError {
        /// Postmark API error code.
        code: i64,
        /// Postmark error message.
        message: String,
    },

    /// An address could not be parsed into a mailbox.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// An attachment could not be read or described.
    #[error("attachment error: {0}")]
    Attachment(String),

    /// The MIME message could not be assembled.
    #[error("message build error: {0}")]
    Message(String),

    /// Template error.
    #[error("template error: {0}")]
    Template(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Error raised by the provider's transport client.
    #[error("{provider} transport error: {source}")]
    Transport {
        /// Provider whose client failed.
        provider: ServiceProvider,
        /// Underlying client error.
        #[source]
        source: TransportError,
    },
}

impl MailError {
    /// Wrap a client error, attributing it to `provider`.
    pub fn transport(provider: ServiceProvider, source: impl Into<TransportError>) -> Self {
        Self::Transport {
            provider,
            source: source.into(),
        }
    }

    /// Check if this error was raised by message validation.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::MissingSubject
                | Self::MissingContent
                | Self::MissingRecipient
                | Self::MaxToRecipientsReached { .. }
                | Self::MaxCcRecipientsReached { .. }
                | Self::MaxBccRecipientsReached { .. }
        )
    }

    /// Check if this error was raised while starting up the service.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::MissingFromUsername | Self::MissingFromDomain | Self::NoServiceProvider | Self::Config(_)
        )
    }

    /// Check if this error came from a provider client.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// The provider this error is attributed to, if any.
    pub fn provider(&self) -> Option<ServiceProvider> {
        match self {
            Self::ProviderNotAvailable { provider, .. }
            | Self::InvalidProviderResponse { provider, .. }
            | Self::Transport { provider, .. } => Some(*provider),
            Self::InvalidFromAddress(_) | Self::MessageNotSent { .. } => {
                Some(ServiceProvider::Mandrill)
            }
            Self::PostmarkError { .. } => Some(ServiceProvider::Postmark),
            _ => None,
        }
    }
}

impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Message(err.to_string())
    }
}

impl From<std::io::Error> for MailError {
    fn from(err: std::io::Error) -> Self {
        Self::Attachment(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::de::Error> for MailError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(feature = "templates")]
impl From<handlebars::RenderError> for MailError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::Template(err.to_string())
    }
}

#[cfg(feature = "templates")]
impl From<handlebars::TemplateError> for MailError {
    fn from(err: handlebars::TemplateError) -> Self {
        Self::Template(err.to_string())
    }
}

#[cfg(feature = "templates")]
impl From<css_inline::InlineError> for MailError {
    fn from(err: css_inline::InlineError) -> Self {
        Self::Template(err.to_string())
    }
}
