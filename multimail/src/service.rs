//! Mail service: provider startup and dispatch.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    Email, MailError, MailServiceConfig, MandrillClient, MandrillTransport, PostmarkClient,
    PostmarkTransport, ProviderRegistry, RecipientLimits, Result, ServiceProvider, SesClient,
    SesTransport, SmtpClient, SmtpConfig, SmtpTransport, Transport,
};

/// Builder for a [`MailService`].
///
/// Clients injected here replace the production client of their provider.
/// The provider's credentials must still be configured for it to start.
#[derive(Default)]
pub struct MailServiceBuilder {
    config: MailServiceConfig,
    ses_client: Option<Arc<dyn SesClient>>,
    mandrill_client: Option<Arc<dyn MandrillClient>>,
    postmark_client: Option<Arc<dyn PostmarkClient>>,
    smtp_client: Option<Arc<dyn SmtpClient>>,
}

impl MailServiceBuilder {
    /// Create a builder from a configuration.
    pub fn new(config: MailServiceConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Use `client` for AWS SES.
    pub fn ses_client(mut self, client: Arc<dyn SesClient>) -> Self {
        self.ses_client = Some(client);
        self
    }

    /// Use `client` for Mandrill.
    pub fn mandrill_client(mut self, client: Arc<dyn MandrillClient>) -> Self {
        self.mandrill_client = Some(client);
        self
    }

    /// Use `client` for Postmark.
    pub fn postmark_client(mut self, client: Arc<dyn PostmarkClient>) -> Self {
        self.postmark_client = Some(client);
        self
    }

    /// Use `client` for SMTP.
    pub fn smtp_client(mut self, client: Arc<dyn SmtpClient>) -> Self {
        self.smtp_client = Some(client);
        self
    }

    /// Validate the configuration and start every provider with credentials.
    ///
    /// Providers are evaluated in [`ServiceProvider::STARTUP_ORDER`]. A
    /// provider whose client cannot be created is skipped with a warning.
    pub fn startup(self) -> Result<MailService> {
        let mut config = self.config.clone();

        if config.from_username.is_empty() {
            return Err(MailError::MissingFromUsername);
        }
        if config.from_domain.is_empty() {
            return Err(MailError::MissingFromDomain);
        }

        let limits = config.recipient_limits();
        config.max_to_recipients = Some(limits.to);
        config.max_cc_recipients = Some(limits.cc);
        config.max_bcc_recipients = Some(limits.bcc);

        let mut registry = ProviderRegistry::new();
        for provider in ServiceProvider::STARTUP_ORDER {
            if !config.has_credentials(provider) {
                debug!(provider = %provider, "No credentials configured, skipping provider");
                continue;
            }

            match self.transport_for(provider, &config) {
                Ok(Some(transport)) => {
                    registry.register(transport);
                    info!(provider = %provider, "Email service provider started");
                }
                Ok(None) => {
                    warn!(
                        provider = %provider,
                        "Credentials configured but no client is available, skipping provider"
                    );
                }
                Err(e) => {
                    warn!(provider = %provider, error = %e, "Failed to start email service provider");
                }
            }
        }

        if registry.is_empty() {
            return Err(MailError::NoServiceProvider);
        }

        info!(
            from = %config.from_address(),
            providers = ?registry.providers(),
            "Mail service started"
        );

        Ok(MailService {
            config,
            limits,
            registry,
        })
    }

    fn transport_for(
        &self,
        provider: ServiceProvider,
        config: &MailServiceConfig,
    ) -> Result<Option<Arc<dyn Transport>>> {
        let transport: Option<Arc<dyn Transport>> = match provider {
            ServiceProvider::Mandrill => self
                .mandrill_client
                .clone()
                .or_else(|| production::mandrill(config))
                .map(|client| Arc::new(MandrillTransport::new(client)) as Arc<dyn Transport>),
            ServiceProvider::AwsSes => self
                .ses_client
                .clone()
                .or_else(|| production::ses(config))
                .map(|client| Arc::new(SesTransport::new(client)) as Arc<dyn Transport>),
            ServiceProvider::Postmark => self
                .postmark_client
                .clone()
                .or_else(|| production::postmark(config))
                .map(|client| Arc::new(PostmarkTransport::new(client)) as Arc<dyn Transport>),
            ServiceProvider::Smtp => match &self.smtp_client {
                Some(client) => Some(Arc::new(SmtpTransport::new(client.clone())) as Arc<dyn Transport>),
                None => {
                    let smtp = SmtpConfig::new(&config.smtp_host)
                        .security(config.smtp_security)
                        .port(config.smtp_port)
                        .credentials(&config.smtp_username, &config.smtp_password);
                    Some(Arc::new(SmtpTransport::from_config(&smtp)?) as Arc<dyn Transport>)
                }
            },
        };
        Ok(transport)
    }
}

/// Production clients, present when their feature is enabled.
mod production {
    use std::sync::Arc;

    use crate::{MailServiceConfig, MandrillClient, PostmarkClient, SesClient};

    #[cfg(feature = "mandrill")]
    pub(super) fn mandrill(config: &MailServiceConfig) -> Option<Arc<dyn MandrillClient>> {
        use crate::{MandrillApiClient, MandrillConfig};
        Some(Arc::new(MandrillApiClient::new(MandrillConfig::new(&config.mandrill_api_key))))
    }

    #[cfg(not(feature = "mandrill"))]
    pub(super) fn mandrill(_config: &MailServiceConfig) -> Option<Arc<dyn MandrillClient>> {
        None
    }

    #[cfg(feature = "ses")]
    pub(super) fn ses(config: &MailServiceConfig) -> Option<Arc<dyn SesClient>> {
        Some(Arc::new(crate::SesApiClient::new(
            &config.aws_ses_access_id,
            &config.aws_ses_secret_key,
            config.ses_region(),
            config.ses_endpoint(),
        )))
    }

    #[cfg(not(feature = "ses"))]
    pub(super) fn ses(_config: &MailServiceConfig) -> Option<Arc<dyn SesClient>> {
        None
    }

    #[cfg(feature = "postmark")]
    pub(super) fn postmark(config: &MailServiceConfig) -> Option<Arc<dyn PostmarkClient>> {
        use crate::{PostmarkApiClient, PostmarkConfig};
        Some(Arc::new(PostmarkApiClient::new(PostmarkConfig::new(&config.postmark_server_token))))
    }

    #[cfg(not(feature = "postmark"))]
    pub(super) fn postmark(_config: &MailServiceConfig) -> Option<Arc<dyn PostmarkClient>> {
        None
    }
}

/// A started mail service.
///
/// Immutable after startup; share it behind an [`Arc`] to send from many
/// tasks at once.
#[derive(Debug)]
pub struct MailService {
    config: MailServiceConfig,
    limits: RecipientLimits,
    registry: ProviderRegistry,
}

impl MailService {
    /// Start a service with the production clients.
    pub fn startup(config: MailServiceConfig) -> Result<Self> {
        MailServiceBuilder::new(config).startup()
    }

    /// Create a builder, to inject clients before startup.
    pub fn builder(config: MailServiceConfig) -> MailServiceBuilder {
        MailServiceBuilder::new(config)
    }

    /// Create an email carrying the service defaults.
    pub fn new_email(&self) -> Email {
        let from_address = self.config.from_address();
        Email {
            css: self.config.email_css.clone(),
            from_name: self.config.from_name.clone(),
            reply_to_address: from_address.clone(),
            from_address,
            auto_text: self.config.auto_text,
            important: self.config.important,
            track_clicks: self.config.track_clicks,
            track_opens: self.config.track_opens,
            ..Default::default()
        }
    }

    /// Validate `email` and send it through `provider`.
    ///
    /// Nothing is sent when the provider is unavailable or the email is
    /// invalid. Provider errors are returned unchanged.
    pub async fn send_email(&self, email: &Email, provider: ServiceProvider) -> Result<()> {
        if !self.registry.is_available(provider) {
            return Err(self.not_available(provider));
        }

        email.validate(&self.limits)?;

        let transport = self
            .registry
            .get(provider)
            .ok_or_else(|| self.not_available(provider))?;

        debug!(
            provider = %provider,
            recipients = email.recipients.len(),
            attachments = email.attachments.len(),
            "Dispatching email"
        );

        transport.send(email).await
    }

    /// Check if `provider` passed startup.
    pub fn is_available(&self, provider: ServiceProvider) -> bool {
        self.registry.is_available(provider)
    }

    /// Providers that passed startup, in startup order.
    pub fn available_providers(&self) -> &[ServiceProvider] {
        self.registry.providers()
    }

    /// Recipient ceilings enforced by [`Self::send_email`].
    pub fn limits(&self) -> RecipientLimits {
        self.limits
    }

    /// The configuration the service was started with, ceilings filled in.
    pub fn config(&self) -> &MailServiceConfig {
        &self.config
    }

    fn not_available(&self, provider: ServiceProvider) -> MailError {
        MailError::ProviderNotAvailable {
            provider,
            available: self.registry.providers().to_vec(),
        }
    }
}
