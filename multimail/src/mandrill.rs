//! Mandrill adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::{Email, MailError, Result, ServiceProvider, Transport, TransportError};

/// Per-recipient statuses that count as a successful send.
pub const SUCCESS_STATUSES: [&str; 3] = ["sent", "queued", "scheduled"];

/// Client capability consumed by the Mandrill adapter.
#[async_trait]
pub trait MandrillClient: Send + Sync {
    /// Send a message, returning one response entry per recipient.
    async fn send_message(
        &self,
        message: &MandrillMessage,
        send_async: bool,
    ) -> std::result::Result<Vec<MandrillSendResponse>, TransportError>;
}

/// Mandrill message payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MandrillMessage {
    /// HTML body.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub html: String,
    /// Plain text body.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Subject.
    pub subject: String,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub from_name: String,
    /// All recipients, each tagged with its kind.
    pub to: Vec<MandrillRecipient>,
    /// Deliver ahead of non-important messages.
    pub important: bool,
    /// Enable open tracking.
    pub track_opens: bool,
    /// Enable click tracking.
    pub track_clicks: bool,
    /// Generate a text part from the HTML.
    pub auto_text: bool,
    /// Keep a viewable copy of the content.
    pub view_content_link: bool,
    /// Expose every recipient in the To header.
    pub preserve_recipients: bool,
    /// DKIM signing domain.
    pub signing_domain: String,
    /// Tags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Base64-encoded attachments.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MandrillAttachment>,
}

/// Mandrill recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandrillRecipient {
    /// Recipient address.
    pub email: String,
    /// Recipient kind: `to`, `cc` or `bcc`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Mandrill attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandrillAttachment {
    /// MIME type.
    #[serde(rename = "type")]
    pub content_type: String,
    /// File name.
    pub name: String,
    /// Base64 content.
    pub content: String,
}

/// Mandrill per-recipient send result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandrillSendResponse {
    /// Recipient address.
    #[serde(default)]
    pub email: String,
    /// Send status (`sent`, `queued`, `scheduled`, `rejected`, `invalid`).
    pub status: String,
    /// Rejection reason, when rejected.
    #[serde(default)]
    pub reject_reason: Option<String>,
    /// Mandrill message id.
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
}

impl MandrillSendResponse {
    /// Check if the status is a terminal success.
    pub fn is_success(&self) -> bool {
        SUCCESS_STATUSES.contains(&self.status.as_str())
    }
}

impl MandrillMessage {
    /// Translate an email, draining and encoding its attachments.
    ///
    /// Fails with [`MailError::InvalidFromAddress`] before touching the
    /// attachments when the sender has no domain.
    pub fn from_email(email: &Email) -> Result<Self> {
        let signing_domain = email.signing_domain()?.to_string();

        let recipients = email
            .recipients
            .iter()
            .map(|r| (r, "to"))
            .chain(email.recipients_bcc.iter().map(|r| (r, "bcc")))
            .chain(email.recipients_cc.iter().map(|r| (r, "cc")))
            .map(|(email, kind)| MandrillRecipient {
                email: email.clone(),
                kind: kind.to_string(),
            })
            .collect();

        let attachments = email
            .attachments
            .iter()
            .map(|a| {
                Ok(MandrillAttachment {
                    content_type: a.file_type.clone(),
                    name: a.file_name.clone(),
                    content: a.read_base64()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            html: email.html_content.clone(),
            text: email.plain_text_content.clone(),
            subject: email.subject.clone(),
            from_email: email.from_address.clone(),
            from_name: email.from_name.clone(),
            to: recipients,
            important: email.important,
            track_opens: email.track_opens,
            track_clicks: email.track_clicks,
            auto_text: email.auto_text,
            view_content_link: email.view_content_link,
            preserve_recipients: false,
            signing_domain,
            tags: email.tags.clone(),
            attachments,
        })
    }
}

/// Mandrill adapter.
#[derive(Clone)]
pub struct MandrillTransport {
    client: Arc<dyn MandrillClient>,
    send_async: bool,
}

impl MandrillTransport {
    /// Create an adapter over a Mandrill client, sending asynchronously.
    pub fn new(client: Arc<dyn MandrillClient>) -> Self {
        Self {
            client,
            send_async: true,
        }
    }

    /// Ask Mandrill to process the send synchronously.
    pub fn synchronous(mut self) -> Self {
        self.send_async = false;
        self
    }
}

#[async_trait]
impl Transport for MandrillTransport {
    fn provider(&self) -> ServiceProvider {
        ServiceProvider::Mandrill
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let message = MandrillMessage::from_email(email)?;

        debug!(
            to = ?email.recipients,
            subject = %email.subject,
            signing_domain = %message.signing_domain,
            "Sending email via Mandrill"
        );

        let responses = self
            .client
            .send_message(&message, self.send_async)
            .await
            .map_err(|e| MailError::transport(ServiceProvider::Mandrill, e))?;

        // The last failing recipient decides the reported status.
        if let Some(failed) = responses.iter().rev().find(|r| !r.is_success()) {
            return Err(MailError::MessageNotSent {
                status: failed.status.clone(),
                reason: failed.reject_reason.clone().unwrap_or_default(),
            });
        }

        debug!(recipients = responses.len(), "Email sent successfully via Mandrill");
        Ok(())
    }
}

#[cfg(feature = "mandrill")]
pub use api::{MandrillApiClient, MandrillConfig};

#[cfg(feature = "mandrill")]
mod api {
    use async_trait::async_trait;
    use reqwest::Client;
    use serde::{Deserialize, Serialize};

    use super::{MandrillClient, MandrillMessage, MandrillSendResponse};
    use crate::TransportError;

    /// Mandrill configuration.
    #[derive(Debug, Clone)]
    pub struct MandrillConfig {
        /// API key.
        pub api_key: String,
        /// API endpoint (defaults to production).
        pub endpoint: String,
    }

    impl MandrillConfig {
        /// Create a new Mandrill configuration.
        pub fn new(api_key: impl Into<String>) -> Self {
            Self {
                api_key: api_key.into(),
                endpoint: "https://mandrillapp.com/api/1.0/messages/send.json".to_string(),
            }
        }

        /// Set a custom endpoint (for testing).
        pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
            self.endpoint = endpoint.into();
            self
        }
    }

    /// Mandrill client over the HTTP API.
    #[derive(Debug, Clone)]
    pub struct MandrillApiClient {
        client: Client,
        config: MandrillConfig,
    }

    impl MandrillApiClient {
        /// Create a new Mandrill client.
        pub fn new(config: MandrillConfig) -> Self {
            Self {
                client: Client::new(),
                config,
            }
        }
    }

    #[derive(Serialize)]
    struct SendRequest<'a> {
        key: &'a str,
        message: &'a MandrillMessage,
        #[serde(rename = "async")]
        send_async: bool,
    }

    #[derive(Debug, Deserialize)]
    struct ApiError {
        code: i64,
        message: String,
    }

    #[async_trait]
    impl MandrillClient for MandrillApiClient {
        async fn send_message(
            &self,
            message: &MandrillMessage,
            send_async: bool,
        ) -> Result<Vec<MandrillSendResponse>, TransportError> {
            let response = self
                .client
                .post(&self.config.endpoint)
                .json(&SendRequest {
                    key: &self.config.api_key,
                    message,
                    send_async,
                })
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;

            if status.is_success() {
                return Ok(serde_json::from_str(&body)?);
            }

            match serde_json::from_str::<ApiError>(&body) {
                Ok(err) => Err(format!("{}: {}", err.code, err.message).into()),
                Err(_) => Err(format!("Mandrill error {}: {}", status, body).into()),
            }
        }
    }
}
