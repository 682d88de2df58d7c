//! Postmark adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::transport::{Feature, warn_unsupported};
use crate::{Email, MailError, PRIORITY_HEADERS, Result, ServiceProvider, Transport, TransportError};

/// Client capability consumed by the Postmark adapter.
#[async_trait]
pub trait PostmarkClient: Send + Sync {
    /// Send a single email.
    async fn send_email(&self, email: &PostmarkEmail) -> std::result::Result<PostmarkResponse, TransportError>;
}

/// Postmark email payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostmarkEmail {
    /// Sender, `Name address` when a display name is set.
    pub from: String,
    /// Comma-joined To recipients.
    pub to: String,
    /// Comma-joined Cc recipients.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cc: String,
    /// Comma-joined Bcc recipients.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bcc: String,
    pub subject: String,
    /// Comma-joined tags.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub html_body: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text_body: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reply_to: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<PostmarkHeader>,
    pub track_opens: bool,
    /// `None` or `HtmlAndText`.
    pub track_links: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PostmarkAttachment>,
}

/// Custom header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostmarkHeader {
    pub name: String,
    pub value: String,
}

/// Base64-encoded attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PostmarkAttachment {
    pub name: String,
    pub content: String,
    pub content_type: String,
}

/// Postmark send response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PostmarkResponse {
    pub to: String,
    pub submitted_at: String,
    #[serde(rename = "MessageID")]
    pub message_id: String,
    /// Zero on success.
    pub error_code: i64,
    pub message: String,
}

impl PostmarkEmail {
    /// Translate an email, draining and encoding its attachments.
    pub fn from_email(email: &Email) -> Result<Self> {
        let from = if email.from_name.is_empty() {
            email.from_address.clone()
        } else {
            format!("{} {}", email.from_name, email.from_address)
        };

        let headers = if email.important {
            PRIORITY_HEADERS
                .iter()
                .map(|(name, value)| PostmarkHeader {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let attachments = email
            .attachments
            .iter()
            .map(|a| {
                Ok(PostmarkAttachment {
                    name: a.file_name.clone(),
                    content: a.read_base64()?,
                    content_type: a.file_type.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            from,
            to: email.recipients.join(","),
            cc: email.recipients_cc.join(","),
            bcc: email.recipients_bcc.join(","),
            subject: email.subject.clone(),
            tag: email.tags.join(","),
            html_body: email.html_content.clone(),
            text_body: email.plain_text_content.clone(),
            reply_to: email.reply_to_address.clone(),
            headers,
            track_opens: email.track_opens,
            track_links: if email.track_clicks { "HtmlAndText" } else { "None" }.to_string(),
            attachments,
        })
    }
}

/// Postmark adapter.
#[derive(Clone)]
pub struct PostmarkTransport {
    client: Arc<dyn PostmarkClient>,
}

impl PostmarkTransport {
    /// Create an adapter over a Postmark client.
    pub fn new(client: Arc<dyn PostmarkClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for PostmarkTransport {
    fn provider(&self) -> ServiceProvider {
        ServiceProvider::Postmark
    }

    async fn send(&self, email: &Email) -> Result<()> {
        warn_unsupported(ServiceProvider::Postmark, email, &[Feature::AutoText]);

        let message = PostmarkEmail::from_email(email)?;

        debug!(
            to = %message.to,
            subject = %message.subject,
            "Sending email via Postmark"
        );

        let response = self
            .client
            .send_email(&message)
            .await
            .map_err(|e| MailError::transport(ServiceProvider::Postmark, e))?;

        if response.error_code != 0 {
            return Err(MailError::PostmarkError {
                code: response.error_code,
                message: response.message,
            });
        }

        debug!(message_id = %response.message_id, "Email sent successfully via Postmark");
        Ok(())
    }
}

#[cfg(feature = "postmark")]
pub use api::{PostmarkApiClient, PostmarkConfig};

#[cfg(feature = "postmark")]
mod api {
    use async_trait::async_trait;
    use reqwest::Client;

    use super::{PostmarkClient, PostmarkEmail, PostmarkResponse};
    use crate::TransportError;

    /// Postmark configuration.
    #[derive(Debug, Clone)]
    pub struct PostmarkConfig {
        /// Server API token.
        pub server_token: String,
        /// API endpoint.
        pub endpoint: String,
    }

    impl PostmarkConfig {
        /// Create a new Postmark configuration.
        pub fn new(server_token: impl Into<String>) -> Self {
            Self {
                server_token: server_token.into(),
                endpoint: "https://api.postmarkapp.com/email".to_string(),
            }
        }

        /// Set a custom endpoint (for testing).
        pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
            self.endpoint = endpoint.into();
            self
        }
    }

    /// Postmark client over the HTTP API.
    #[derive(Debug, Clone)]
    pub struct PostmarkApiClient {
        client: Client,
        config: PostmarkConfig,
    }

    impl PostmarkApiClient {
        /// Create a new Postmark client.
        pub fn new(config: PostmarkConfig) -> Self {
            Self {
                client: Client::new(),
                config,
            }
        }
    }

    #[async_trait]
    impl PostmarkClient for PostmarkApiClient {
        async fn send_email(&self, email: &PostmarkEmail) -> Result<PostmarkResponse, TransportError> {
            let response = self
                .client
                .post(&self.config.endpoint)
                .header("Accept", "application/json")
                .header("X-Postmark-Server-Token", &self.config.server_token)
                .json(email)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;

            // Error bodies with a non-zero ErrorCode go to the adapter as they are.
            match serde_json::from_str::<PostmarkResponse>(&body) {
                Ok(response) if status.is_success() || response.error_code != 0 => Ok(response),
                _ => Err(format!("Postmark error {}: {}", status, body).into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePostmark {
        sent: Mutex<Vec<PostmarkEmail>>,
    }

    #[async_trait]
    impl PostmarkClient for FakePostmark {
        async fn send_email(&self, email: &PostmarkEmail) -> std::result::Result<PostmarkResponse, TransportError> {
            self.sent.lock().unwrap().push(email.clone());

            match email.to.as_str() {
                "test@badhostname.com" => Err(format!(
                    "400 The 'From' address you supplied ({}) is not a Sender Signature on your account",
                    email.from
                )
                .into()),
                "test@badtoken.com" => {
                    Err("10 The Server Token you provided in the X-Postmark-Server-Token request header was invalid".into())
                }
                "test@errorcode.com" => Ok(PostmarkResponse {
                    error_code: 502,
                    message: "Bad Gateway".to_string(),
                    ..Default::default()
                }),
                _ => Ok(PostmarkResponse::default()),
            }
        }
    }

    fn email(recipient: &str) -> Email {
        let mut email = Email::new()
            .from("no-reply@example.com")
            .from_name("No Reply")
            .reply_to("no-reply@example.com")
            .to(recipient)
            .subject("Test")
            .text("Test")
            .html("<html>Test</html>")
            .important(true);
        email.auto_text = true;
        email.track_clicks = true;
        email.track_opens = true;
        email.add_attachment("test-attachment-file.txt", "text/plain", std::io::Cursor::new(b"hello".to_vec()));
        email
    }

    #[test]
    fn test_from_email_mapping() {
        let email = email("a@example.com")
            .to("b@example.com")
            .cc("c@example.com")
            .bcc("d@example.com")
            .bcc("e@example.com")
            .tag("welcome")
            .tag("beta");

        let message = PostmarkEmail::from_email(&email).unwrap();
        assert_eq!(message.from, "No Reply no-reply@example.com");
        assert_eq!(message.to, "a@example.com,b@example.com");
        assert_eq!(message.cc, "c@example.com");
        assert_eq!(message.bcc, "d@example.com,e@example.com");
        assert_eq!(message.tag, "welcome,beta");
        assert_eq!(message.track_links, "HtmlAndText");
        assert!(message.track_opens);
        assert_eq!(message.headers.len(), 3);
        assert_eq!(message.headers[0].name, "X-Priority");
        assert_eq!(message.attachments[0].content, "aGVsbG8=");
    }

    #[test]
    fn test_from_email_defaults() {
        let email = Email::new()
            .from("no-reply@example.com")
            .to("a@example.com")
            .subject("Test")
            .text("Test");

        let message = PostmarkEmail::from_email(&email).unwrap();
        assert_eq!(message.from, "no-reply@example.com");
        assert_eq!(message.track_links, "None");
        assert!(message.headers.is_empty());

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["From"], "no-reply@example.com");
        assert_eq!(json["TrackLinks"], "None");
        assert!(json.get("Cc").is_none());
        assert!(json.get("Headers").is_none());
    }

    #[test]
    fn test_response_deserialization() {
        let response: PostmarkResponse = serde_json::from_str(
            r#"{"To":"a@example.com","SubmittedAt":"2024-01-01T00:00:00Z","MessageID":"abc","ErrorCode":0,"Message":"OK"}"#,
        )
        .unwrap();
        assert_eq!(response.message_id, "abc");
        assert_eq!(response.error_code, 0);

        let response: PostmarkResponse =
            serde_json::from_str(r#"{"ErrorCode":10,"Message":"Bad or missing API token"}"#).unwrap();
        assert_eq!(response.error_code, 10);
    }

    #[tokio::test]
    async fn test_send_via_postmark() {
        let cases = [
            ("test@domain.com", false),
            ("test@badhostname.com", true),
            ("test@badtoken.com", true),
            ("test@errorcode.com", true),
        ];

        let transport = PostmarkTransport::new(Arc::new(FakePostmark::default()));
        for (recipient, expect_error) in cases {
            let result = transport.send(&email(recipient)).await;
            assert_eq!(result.is_err(), expect_error, "recipient {recipient}: {result:?}");
        }
    }

    #[tokio::test]
    async fn test_error_code_is_postmark_error() {
        let transport = PostmarkTransport::new(Arc::new(FakePostmark::default()));

        let err = transport.send(&email("test@errorcode.com")).await.unwrap_err();
        match err {
            MailError::PostmarkError { code, message } => {
                assert_eq!(code, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = transport.send(&email("test@badtoken.com")).await.unwrap_err();
        assert_eq!(err.provider(), Some(ServiceProvider::Postmark));
        assert!(err.is_transport_error());
    }

    #[cfg(feature = "postmark")]
    fn api_transport(url: &str) -> PostmarkTransport {
        let config = PostmarkConfig::new("server-token").endpoint(url);
        PostmarkTransport::new(Arc::new(PostmarkApiClient::new(config)))
    }

    #[cfg(feature = "postmark")]
    #[tokio::test]
    async fn test_api_client_accepted() {
        let server = crate::test_server::serve_once(
            200,
            "OK",
            r#"{"To":"a@example.com","SubmittedAt":"2024-01-01T00:00:00Z","MessageID":"abc","ErrorCode":0,"Message":"OK"}"#,
        )
        .await;

        let client = PostmarkApiClient::new(PostmarkConfig::new("server-token").endpoint(&server.url));
        let message = PostmarkEmail::from_email(&email("a@example.com")).unwrap();
        let response = client.send_email(&message).await.unwrap();
        assert_eq!(response.message_id, "abc");
        assert_eq!(response.error_code, 0);

        let request = server.request.await.unwrap();
        assert!(request.starts_with("POST "));
        assert!(request.to_ascii_lowercase().contains("x-postmark-server-token: server-token"));
        assert!(request.contains(r#""To":"a@example.com""#));
    }

    #[cfg(feature = "postmark")]
    #[tokio::test]
    async fn test_api_client_error_code_reaches_adapter() {
        let server = crate::test_server::serve_once(
            422,
            "Unprocessable Entity",
            r#"{"ErrorCode":300,"Message":"Invalid email request"}"#,
        )
        .await;

        let err = api_transport(&server.url)
            .send(&email("a@example.com"))
            .await
            .unwrap_err();
        match err {
            MailError::PostmarkError { code, message } => {
                assert_eq!(code, 300);
                assert_eq!(message, "Invalid email request");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(feature = "postmark")]
    #[tokio::test]
    async fn test_api_client_unavailable_is_transport_error() {
        let server =
            crate::test_server::serve_once(503, "Service Unavailable", r#"{"Message":"Service Unavailable"}"#).await;

        let err = api_transport(&server.url)
            .send(&email("a@example.com"))
            .await
            .unwrap_err();
        assert!(err.is_transport_error());
        assert_eq!(err.provider(), Some(ServiceProvider::Postmark));
        assert!(err.to_string().contains("503"), "{err}");
    }

    #[cfg(feature = "postmark")]
    #[tokio::test]
    async fn test_api_client_non_json_body() {
        let server = crate::test_server::serve_once(502, "Bad Gateway", "<html>upstream down</html>").await;

        let client = PostmarkApiClient::new(PostmarkConfig::new("server-token").endpoint(&server.url));
        let message = PostmarkEmail::from_email(&email("a@example.com")).unwrap();
        let err = client.send_email(&message).await.unwrap_err();
        assert_eq!(err.to_string(), "Postmark error 502 Bad Gateway: <html>upstream down</html>");
    }
}
