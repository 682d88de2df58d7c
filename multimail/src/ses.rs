//! AWS SES adapter (raw MIME).

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::transport::{Feature, warn_unsupported};
use crate::{Email, MailError, Result, ServiceProvider, Transport, TransportError};

/// Marker that a successful `SendRawEmail` response always contains.
pub const SEND_RAW_EMAIL_RESULT: &str = "SendRawEmailResult";

/// Client capability consumed by the SES adapter.
///
/// Returns the provider's textual response to a raw send.
#[async_trait]
pub trait SesClient: Send + Sync {
    /// Send a raw MIME message.
    async fn send_raw_email(&self, raw: Vec<u8>) -> std::result::Result<String, TransportError>;
}

/// Render the `SendRawEmail` XML response for a structured send result.
///
/// A missing request id is rendered as `unknown`.
pub fn send_raw_email_response(message_id: &str, request_id: Option<&str>) -> String {
    format!(
        r#"<SendRawEmailResponse xmlns="http://ses.amazonaws.com/doc/2010-12-01/">
  <SendRawEmailResult>
    <MessageId>{}</MessageId>
  </SendRawEmailResult>
  <ResponseMetadata>
    <RequestId>{}</RequestId>
  </ResponseMetadata>
</SendRawEmailResponse>"#,
        message_id,
        request_id.unwrap_or("unknown")
    )
}

/// AWS SES adapter.
#[derive(Clone)]
pub struct SesTransport {
    client: Arc<dyn SesClient>,
}

impl SesTransport {
    /// Create an adapter over an SES client.
    pub fn new(client: Arc<dyn SesClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for SesTransport {
    fn provider(&self) -> ServiceProvider {
        ServiceProvider::AwsSes
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let message = email.to_lettre()?;

        warn_unsupported(
            ServiceProvider::AwsSes,
            email,
            &[Feature::TrackClicks, Feature::TrackOpens, Feature::AutoText],
        );

        debug!(
            to = ?email.recipients,
            subject = %email.subject,
            "Sending email via AWS SES"
        );

        let response = self
            .client
            .send_raw_email(message.formatted())
            .await
            .map_err(|e| MailError::transport(ServiceProvider::AwsSes, e))?;

        if !response.contains(SEND_RAW_EMAIL_RESULT) {
            return Err(MailError::InvalidProviderResponse {
                provider: ServiceProvider::AwsSes,
                response,
            });
        }

        debug!("Email sent successfully via AWS SES");
        Ok(())
    }
}

#[cfg(feature = "ses")]
pub use api::SesApiClient;

#[cfg(feature = "ses")]
mod api {
    use async_trait::async_trait;
    use aws_sdk_sesv2::{
        Client,
        config::{BehaviorVersion, Credentials, Region},
        operation::RequestId,
        primitives::Blob,
        types::{EmailContent, RawMessage},
    };
    use tracing::info;

    use super::{SesClient, send_raw_email_response};
    use crate::TransportError;

    /// SES client backed by the AWS SDK.
    #[derive(Debug, Clone)]
    pub struct SesApiClient {
        client: Client,
    }

    impl SesApiClient {
        /// Create a client with static credentials.
        pub fn new(access_id: &str, secret_key: &str, region: &str, endpoint: &str) -> Self {
            let credentials = Credentials::new(access_id, secret_key, None, None, "multimail");

            let config = aws_sdk_sesv2::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(Region::new(region.to_string()))
                .endpoint_url(endpoint)
                .credentials_provider(credentials)
                .build();

            info!(region = %region, endpoint = %endpoint, "AWS SES client initialized");

            Self {
                client: Client::from_conf(config),
            }
        }

        /// Create from an existing AWS SDK client.
        pub fn from_client(client: Client) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl SesClient for SesApiClient {
        async fn send_raw_email(&self, raw: Vec<u8>) -> Result<String, TransportError> {
            let raw_message = RawMessage::builder().data(Blob::new(raw)).build()?;

            let output = self
                .client
                .send_email()
                .content(EmailContent::builder().raw(raw_message).build())
                .send()
                .await?;

            Ok(send_raw_email_response(
                output.message_id().unwrap_or_default(),
                output.request_id(),
            ))
        }
    }
}
