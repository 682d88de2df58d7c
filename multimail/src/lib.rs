//! # Multimail
//!
//! One email API over several delivery providers.
//!
//! ## Features
//!
//! - **Providers**: AWS SES (raw MIME), Mandrill, Postmark and direct SMTP
//! - **Startup**: every provider with credentials is started, in a fixed order
//! - **Validation**: subject, content, recipients and recipient ceilings are
//!   checked before anything is sent
//! - **Attachments**: streamed from any reader, encoded per provider
//! - **Templates**: Handlebars bodies with inlined CSS
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use multimail::{MailService, MailServiceConfig, ServiceProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MailServiceConfig::new()
//!         .from("no-reply", "example.com")
//!         .from_name("No Reply")
//!         .postmark("server-token");
//!
//!     let mail = MailService::startup(config)?;
//!
//!     let email = mail
//!         .new_email()
//!         .to("recipient@example.com")
//!         .subject("Hello!")
//!         .text("This is a test email.")
//!         .html("<h1>Hello!</h1><p>This is a test email.</p>");
//!
//!     mail.send_email(&email, ServiceProvider::Postmark).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Testing
//!
//! Each provider adapter talks to its service through a client trait
//! ([`SesClient`], [`MandrillClient`], [`PostmarkClient`], [`SmtpClient`]).
//! Inject fakes with [`MailService::builder`]:
//!
//! ```rust,ignore
//! let mail = MailService::builder(config)
//!     .postmark_client(Arc::new(FakePostmark::default()))
//!     .startup()?;
//! ```

mod attachment;
mod config;
mod email;
mod error;
mod mandrill;
mod postmark;
mod provider;
mod registry;
mod service;
mod ses;
mod smtp;
mod transport;

#[cfg(feature = "templates")]
mod template;

#[cfg(all(test, any(feature = "mandrill", feature = "postmark")))]
mod test_server;

pub use attachment::Attachment;
pub use config::{
    AWS_SES_DEFAULT_ENDPOINT, AWS_SES_DEFAULT_REGION, DEFAULT_MAX_RECIPIENTS, MailServiceConfig,
    RecipientLimits,
};
pub use email::{Email, PRIORITY_HEADERS};
pub use error::{MailError, Result, TransportError};
pub use mandrill::{
    MandrillAttachment, MandrillClient, MandrillMessage, MandrillRecipient, MandrillSendResponse,
    MandrillTransport, SUCCESS_STATUSES,
};
pub use postmark::{
    PostmarkAttachment, PostmarkClient, PostmarkEmail, PostmarkHeader, PostmarkResponse,
    PostmarkTransport,
};
pub use provider::ServiceProvider;
pub use registry::ProviderRegistry;
pub use service::{MailService, MailServiceBuilder};
pub use ses::{SEND_RAW_EMAIL_RESULT, SesClient, SesTransport, send_raw_email_response};
pub use smtp::{SmtpClient, SmtpConfig, SmtpSecurity, SmtpTransport};
pub use transport::Transport;

#[cfg(feature = "mandrill")]
pub use mandrill::{MandrillApiClient, MandrillConfig};

#[cfg(feature = "postmark")]
pub use postmark::{PostmarkApiClient, PostmarkConfig};

#[cfg(feature = "ses")]
pub use ses::SesApiClient;

#[cfg(feature = "templates")]
pub use template::{MailTemplate, STYLES_PLACEHOLDER};

/// Prelude for common imports.
///
/// ```
/// use multimail::prelude::*;
/// ```
pub mod prelude {
    pub use crate::attachment::Attachment;
    pub use crate::config::{MailServiceConfig, RecipientLimits};
    pub use crate::email::Email;
    pub use crate::error::{MailError, Result};
    pub use crate::provider::ServiceProvider;
    pub use crate::service::{MailService, MailServiceBuilder};
    pub use crate::transport::Transport;

    #[cfg(feature = "templates")]
    pub use crate::template::MailTemplate;
}
