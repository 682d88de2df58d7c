//! Direct SMTP adapter.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    transport::smtp::authentication::Credentials,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::transport::{Feature, warn_unsupported};
use crate::{Email, MailError, Result, ServiceProvider, Transport, TransportError};

/// SMTP security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmtpSecurity {
    /// No encryption (port 25, not recommended).
    None,
    /// STARTTLS upgrade (port 587).
    #[default]
    StartTls,
    /// Implicit TLS (port 465).
    Tls,
}

impl SmtpSecurity {
    /// The conventional port for this mode.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::None => 25,
            Self::StartTls => 587,
            Self::Tls => 465,
        }
    }
}

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    /// SMTP server host.
    pub host: String,
    /// SMTP server port.
    pub port: u16,
    /// Security mode.
    pub security: SmtpSecurity,
    /// Username for authentication.
    pub username: String,
    /// Password for authentication.
    pub password: String,
    /// Connection timeout.
    pub timeout: Duration,
}

impl SmtpConfig {
    /// Create a new SMTP configuration.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: SmtpSecurity::StartTls.default_port(),
            security: SmtpSecurity::StartTls,
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the port, `0` keeps the default for the security mode.
    pub fn port(mut self, port: u16) -> Self {
        self.port = if port == 0 { self.security.default_port() } else { port };
        self
    }

    /// Set the security mode and its default port.
    pub fn security(mut self, security: SmtpSecurity) -> Self {
        self.security = security;
        self.port = security.default_port();
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a lettre SMTP transport from this configuration.
    pub fn build(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = match self.security {
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.host),
            SmtpSecurity::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
                .map_err(|e| MailError::transport(ServiceProvider::Smtp, e))?,
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
                .map_err(|e| MailError::transport(ServiceProvider::Smtp, e))?,
        };

        let transport = builder
            .port(self.port)
            .timeout(Some(self.timeout))
            .credentials(Credentials::new(self.username.clone(), self.password.clone()))
            .build();

        info!(
            host = %self.host,
            port = self.port,
            security = ?self.security,
            "SMTP transport initialized"
        );

        Ok(transport)
    }
}

/// Client capability consumed by the SMTP adapter.
#[async_trait]
pub trait SmtpClient: Send + Sync {
    /// Deliver a fully built message.
    async fn send(&self, message: lettre::Message) -> std::result::Result<(), TransportError>;
}

#[async_trait]
impl SmtpClient for AsyncSmtpTransport<Tokio1Executor> {
    async fn send(&self, message: lettre::Message) -> std::result::Result<(), TransportError> {
        AsyncTransport::send(self, message).await?;
        Ok(())
    }
}

/// SMTP adapter.
#[derive(Clone)]
pub struct SmtpTransport {
    client: Arc<dyn SmtpClient>,
}

impl SmtpTransport {
    /// Create an adapter over an SMTP client.
    pub fn new(client: Arc<dyn SmtpClient>) -> Self {
        Self { client }
    }

    /// Create an adapter over a lettre transport built from `config`.
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(config.build()?)))
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    fn provider(&self) -> ServiceProvider {
        ServiceProvider::Smtp
    }

    async fn send(&self, email: &Email) -> Result<()> {
        let message = email.to_lettre()?;

        warn_unsupported(
            ServiceProvider::Smtp,
            email,
            &[Feature::TrackClicks, Feature::TrackOpens, Feature::AutoText],
        );

        debug!(
            to = ?email.recipients,
            subject = %email.subject,
            "Sending email via SMTP"
        );

        self.client
            .send(message)
            .await
            .map_err(|e| MailError::transport(ServiceProvider::Smtp, e))?;

        debug!("Email sent successfully via SMTP");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Attachment;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSmtp {
        sent: Mutex<Vec<String>>,
        fail_with: Option<&'static str>,
    }

    #[async_trait]
    impl SmtpClient for FakeSmtp {
        async fn send(&self, message: lettre::Message) -> std::result::Result<(), TransportError> {
            self.sent
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&message.formatted()).into_owned());
            match self.fail_with {
                Some(err) => Err(err.into()),
                None => Ok(()),
            }
        }
    }

    fn email() -> Email {
        let mut email = Email::new()
            .from("no-reply@example.com")
            .from_name("No Reply")
            .to("test@domain.com")
            .cc("cc@domain.com")
            .bcc("bcc@domain.com")
            .subject("Test")
            .text("Test")
            .html("<html>Test</html>")
            .important(true);
        email.track_clicks = true;
        email.track_opens = true;
        email.auto_text = true;
        email.add_attachment("test-attachment-file.txt", "text/plain", std::io::Cursor::new(b"attached".to_vec()));
        email
    }

    #[test]
    fn test_smtp_config_builder() {
        let config = SmtpConfig::new("smtp.example.com")
            .security(SmtpSecurity::Tls)
            .credentials("user", "pass");

        assert_eq!(config.host, "smtp.example.com");
        assert_eq!(config.port, 465);
        assert_eq!(config.security, SmtpSecurity::Tls);
        assert_eq!(config.username, "user");

        assert_eq!(config.port(0).port, 465);
    }

    #[tokio::test]
    async fn test_send_via_smtp() {
        let client = Arc::new(FakeSmtp::default());
        let transport = SmtpTransport::new(client.clone());

        transport.send(&email()).await.unwrap();

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("To: test@domain.com"));
        assert!(sent[0].contains("Bcc: bcc@domain.com"));
        assert!(sent[0].contains("X-Priority: 1 (Highest)"));
        assert!(sent[0].contains("test-attachment-file.txt"));
    }

    #[tokio::test]
    async fn test_smtp_errors_pass_through() {
        let client = Arc::new(FakeSmtp {
            fail_with: Some("535 5.7.8 Authentication credentials invalid"),
            ..Default::default()
        });
        let transport = SmtpTransport::new(client);

        let err = transport.send(&email()).await.unwrap_err();
        match err {
            MailError::Transport { provider, source } => {
                assert_eq!(provider, ServiceProvider::Smtp);
                assert_eq!(source.to_string(), "535 5.7.8 Authentication credentials invalid");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_recipient_never_reaches_client() {
        let client = Arc::new(FakeSmtp::default());
        let transport = SmtpTransport::new(client.clone());

        let email = Email::new()
            .from("no-reply@example.com")
            .to("not an address")
            .subject("Test")
            .text("Test")
            .attach(Attachment::from_bytes("a.txt", "text/plain", "a"));

        assert!(matches!(transport.send(&email).await, Err(MailError::InvalidAddress(_))));
        assert!(client.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_transport_error() {
        let config = SmtpConfig::new("127.0.0.1")
            .security(SmtpSecurity::None)
            .port(1)
            .timeout(Duration::from_secs(2))
            .credentials("user", "pass");
        let transport = SmtpTransport::from_config(&config).unwrap();

        let email = Email::new()
            .from("no-reply@example.com")
            .to("test@domain.com")
            .subject("Test")
            .text("Test");

        let err = transport.send(&email).await.unwrap_err();
        assert!(err.is_transport_error());
    }
}
