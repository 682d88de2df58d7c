//! Provider adapter contract.

use async_trait::async_trait;
use tracing::warn;

use crate::{Email, Result, ServiceProvider};

/// A provider adapter: translates an [`Email`] into the provider's wire
/// format, hands it to the provider's client and interprets the response.
///
/// Adapters read the email but never modify it, apart from draining the
/// attachment streams.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The provider this adapter sends through.
    fn provider(&self) -> ServiceProvider;

    /// Send an email.
    async fn send(&self, email: &Email) -> Result<()>;
}

/// Optional features some providers cannot honour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Feature {
    TrackClicks,
    TrackOpens,
    AutoText,
}

impl Feature {
    fn name(&self) -> &'static str {
        match self {
            Self::TrackClicks => "track clicks",
            Self::TrackOpens => "track opens",
            Self::AutoText => "auto text",
        }
    }

    fn enabled(&self, email: &Email) -> bool {
        match self {
            Self::TrackClicks => email.track_clicks,
            Self::TrackOpens => email.track_opens,
            Self::AutoText => email.auto_text,
        }
    }
}

/// Log a warning for every enabled feature in `unsupported`.
///
/// Returns the features that were warned about.
pub(crate) fn warn_unsupported(
    provider: ServiceProvider,
    email: &Email,
    unsupported: &[Feature],
) -> Vec<Feature> {
    unsupported
        .iter()
        .copied()
        .filter(|feature| feature.enabled(email))
        .inspect(|feature| {
            warn!(
                provider = %provider,
                feature = feature.name(),
                "{} is enabled, but {} does not offer this feature",
                feature.name(),
                provider
            );
        })
        .collect()
}
