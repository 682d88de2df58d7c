//! Service provider identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MailError;

/// An email service provider that a message can be dispatched through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceProvider {
    /// Amazon Simple Email Service (raw MIME).
    AwsSes,
    /// Mandrill transactional API.
    Mandrill,
    /// Postmark transactional API.
    Postmark,
    /// Direct SMTP relay.
    Smtp,
}

impl ServiceProvider {
    /// All providers, in the order they are evaluated at startup.
    pub const STARTUP_ORDER: [ServiceProvider; 4] = [
        ServiceProvider::Mandrill,
        ServiceProvider::AwsSes,
        ServiceProvider::Postmark,
        ServiceProvider::Smtp,
    ];

    /// Stable machine name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwsSes => "aws_ses",
            Self::Mandrill => "mandrill",
            Self::Postmark => "postmark",
            Self::Smtp => "smtp",
        }
    }
}

impl fmt::Display for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwsSes => "AWS SES",
            Self::Mandrill => "Mandrill",
            Self::Postmark => "Postmark",
            Self::Smtp => "SMTP",
        };
        f.write_str(name)
    }
}

impl FromStr for ServiceProvider {
    type Err = MailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "aws_ses" | "ses" => Ok(Self::AwsSes),
            "mandrill" => Ok(Self::Mandrill),
            "postmark" => Ok(Self::Postmark),
            "smtp" => Ok(Self::Smtp),
            other => Err(MailError::Config(format!("unknown service provider: {}", other))),
        }
    }
}
