//! Email message types.

use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, MultiPart, SinglePart};
use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::{Attachment, MailError, RecipientLimits, Result};

/// Headers added to every message flagged as important.
pub const PRIORITY_HEADERS: [(&str, &str); 3] = [
    ("X-Priority", "1 (Highest)"),
    ("X-MSMail-Priority", "High"),
    ("Importance", "High"),
];

/// Provider-agnostic email message.
///
/// Usually created with [`MailService::new_email`](crate::MailService::new_email)
/// so that the sender fields and flags carry the service defaults.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Email {
    /// Attachments, sent in the order they were added.
    #[serde(skip)]
    pub attachments: Vec<Attachment>,
    /// Stylesheet used by the template collaborator.
    pub css: String,
    /// To recipients.
    pub recipients: Vec<String>,
    /// BCC recipients.
    pub recipients_bcc: Vec<String>,
    /// CC recipients.
    pub recipients_cc: Vec<String>,
    /// Free-form tags (Mandrill, Postmark).
    pub tags: Vec<String>,
    /// Sender address.
    pub from_address: String,
    /// Sender display name.
    pub from_name: String,
    /// HTML body.
    pub html_content: String,
    /// Plain text body.
    pub plain_text_content: String,
    /// Reply-to address.
    pub reply_to_address: String,
    /// Email subject.
    pub subject: String,
    /// Let the provider generate a text part from the HTML.
    pub auto_text: bool,
    /// Deliver ahead of non-important messages.
    pub important: bool,
    /// Enable click tracking.
    pub track_clicks: bool,
    /// Enable open tracking.
    pub track_opens: bool,
    /// Allow the provider to keep a viewable copy of the content.
    pub view_content_link: bool,
}

impl Email {
    /// Create a new empty email.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address.
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from_address = address.into();
        self
    }

    /// Set the sender display name.
    pub fn from_name(mut self, name: impl Into<String>) -> Self {
        self.from_name = name.into();
        self
    }

    /// Set the reply-to address.
    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to_address = address.into();
        self
    }

    /// Add a to recipient.
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.recipients.push(address.into());
        self
    }

    /// Add multiple to recipients.
    pub fn to_many<I, A>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.recipients.extend(recipients.into_iter().map(Into::into));
        self
    }

    /// Add a CC recipient.
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.recipients_cc.push(address.into());
        self
    }

    /// Add a BCC recipient.
    pub fn bcc(mut self, address: impl Into<String>) -> Self {
        self.recipients_bcc.push(address.into());
        self
    }

    /// Set the subject.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the plain text body.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.plain_text_content = text.into();
        self
    }

    /// Set the HTML body.
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html_content = html.into();
        self
    }

    /// Add a tag.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Mark the email as important.
    pub fn important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    /// Add an attachment.
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Append an attachment read from `reader` when the email is sent.
    pub fn add_attachment(
        &mut self,
        name: impl Into<String>,
        file_type: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) {
        self.attachments.push(Attachment::new(name, file_type, reader));
    }

    /// Validate the email against the rules shared by every provider.
    ///
    /// Rules are checked in a fixed order and the first violation is returned.
    pub fn validate(&self, limits: &RecipientLimits) -> Result<()> {
        if self.subject.is_empty() {
            return Err(MailError::MissingSubject);
        }
        if self.plain_text_content.is_empty() && self.html_content.is_empty() {
            return Err(MailError::MissingContent);
        }
        if self.recipients.is_empty() {
            return Err(MailError::MissingRecipient);
        }
        if self.recipients.len() > limits.to {
            return Err(MailError::MaxToRecipientsReached {
                limit: limits.to,
                count: self.recipients.len(),
            });
        }
        if self.recipients_cc.len() > limits.cc {
            return Err(MailError::MaxCcRecipientsReached {
                limit: limits.cc,
                count: self.recipients_cc.len(),
            });
        }
        if self.recipients_bcc.len() > limits.bcc {
            return Err(MailError::MaxBccRecipientsReached {
                limit: limits.bcc,
                count: self.recipients_bcc.len(),
            });
        }
        Ok(())
    }

    /// The domain part of the sender address, used for DKIM signing.
    pub fn signing_domain(&self) -> Result<&str> {
        match self.from_address.split('@').nth(1) {
            Some(domain) if !domain.is_empty() => Ok(domain),
            _ => Err(MailError::InvalidFromAddress(self.from_address.clone())),
        }
    }

    /// Build a lettre message, draining the attachment streams.
    pub(crate) fn to_lettre(&self) -> Result<lettre::Message> {
        let from_name = (!self.from_name.is_empty()).then(|| self.from_name.clone());

        let mut builder = lettre::Message::builder()
            .from(Mailbox::new(from_name, parse_address(&self.from_address)?))
            .subject(self.subject.clone())
            .keep_bcc();

        for addr in &self.recipients {
            builder = builder.to(Mailbox::new(None, parse_address(addr)?));
        }
        for addr in &self.recipients_cc {
            builder = builder.cc(Mailbox::new(None, parse_address(addr)?));
        }
        for addr in &self.recipients_bcc {
            builder = builder.bcc(Mailbox::new(None, parse_address(addr)?));
        }

        if !self.reply_to_address.is_empty() {
            builder = builder.reply_to(Mailbox::new(None, parse_address(&self.reply_to_address)?));
        }

        if self.important {
            builder = builder
                .header(XPriority)
                .header(XMsMailPriority)
                .header(Importance);
        }

        let body = match (self.plain_text_content.is_empty(), self.html_content.is_empty()) {
            (false, false) => Body::Multi(MultiPart::alternative_plain_html(
                self.plain_text_content.clone(),
                self.html_content.clone(),
            )),
            (false, true) => Body::Single(SinglePart::plain(self.plain_text_content.clone())),
            (true, false) => Body::Single(SinglePart::html(self.html_content.clone())),
            (true, true) => return Err(MailError::MissingContent),
        };

        if self.attachments.is_empty() {
            return Ok(match body {
                Body::Single(part) => builder.singlepart(part)?,
                Body::Multi(part) => builder.multipart(part)?,
            });
        }

        let mut mixed = match body {
            Body::Single(part) => MultiPart::mixed().singlepart(part),
            Body::Multi(part) => MultiPart::mixed().multipart(part),
        };

        for attachment in &self.attachments {
            let file_type = if attachment.file_type.is_empty() {
                "application/octet-stream"
            } else {
                attachment.file_type.as_str()
            };
            let content_type = ContentType::parse(file_type).map_err(|e| {
                MailError::Attachment(format!("{}: {}: {}", attachment.file_name, file_type, e))
            })?;

            let part = lettre::message::Attachment::new(attachment.file_name.clone())
                .body(attachment.read_content()?, content_type);
            mixed = mixed.singlepart(part);
        }

        Ok(builder.multipart(mixed)?)
    }
}

enum Body {
    Single(SinglePart),
    Multi(MultiPart),
}

fn parse_address(address: &str) -> Result<lettre::Address> {
    address
        .trim()
        .parse()
        .map_err(|e| MailError::InvalidAddress(format!("{}: {}", address, e)))
}

macro_rules! priority_header {
    ($name:ident, $index:expr) => {
        #[derive(Debug, Clone, Copy)]
        struct $name;

        impl Header for $name {
            fn name() -> HeaderName {
                HeaderName::new_from_ascii_str(PRIORITY_HEADERS[$index].0)
            }

            fn parse(_s: &str) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
                Ok(Self)
            }

            fn display(&self) -> HeaderValue {
                HeaderValue::new(Self::name(), PRIORITY_HEADERS[$index].1.to_string())
            }
        }
    };
}

priority_header!(XPriority, 0);
priority_header!(XMsMailPriority, 1);
priority_header!(Importance, 2);

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_email() -> Email {
        Email::new()
            .from("no-reply@example.com")
            .to("recipient@example.com")
            .subject("Test")
            .text("Hello, world!")
    }

    fn formatted(email: &Email) -> String {
        String::from_utf8(email.to_lettre().unwrap().formatted()).unwrap()
    }

    #[test]
    fn test_email_builder() {
        assert!(valid_email().validate(&RecipientLimits::default()).is_ok());
    }

    #[test]
    fn test_validation_order() {
        let limits = RecipientLimits::default();

        let email = Email::new();
        assert!(matches!(email.validate(&limits), Err(MailError::MissingSubject)));

        let email = Email::new().subject("Test");
        assert!(matches!(email.validate(&limits), Err(MailError::MissingContent)));

        let email = Email::new().subject("Test").html("<p>Hi</p>");
        assert!(matches!(email.validate(&limits), Err(MailError::MissingRecipient)));
    }

    #[test]
    fn test_to_ceiling_is_inclusive() {
        let limits = RecipientLimits::default();
        let addresses: Vec<String> = (0..50).map(|i| format!("user{}@example.com", i)).collect();

        let email = valid_email().to_many(addresses.iter().skip(1).cloned());
        assert_eq!(email.recipients.len(), 50);
        assert!(email.validate(&limits).is_ok());

        let email = email.to("one-too-many@example.com");
        assert!(matches!(
            email.validate(&limits),
            Err(MailError::MaxToRecipientsReached { limit: 50, count: 51 })
        ));
    }

    #[test]
    fn test_cc_and_bcc_ceilings() {
        let limits = RecipientLimits::new(10, 1, 2);

        let email = valid_email().cc("a@example.com");
        assert!(email.validate(&limits).is_ok());

        let email = valid_email().bcc("a@example.com").bcc("b@example.com");
        assert!(email.validate(&limits).is_ok());

        let email = valid_email().cc("a@example.com").cc("b@example.com");
        assert!(matches!(
            email.validate(&limits),
            Err(MailError::MaxCcRecipientsReached { limit: 1, count: 2 })
        ));

        let email = valid_email().bcc("a@example.com").bcc("b@example.com").bcc("c@example.com");
        assert!(matches!(
            email.validate(&limits),
            Err(MailError::MaxBccRecipientsReached { limit: 2, count: 3 })
        ));
    }

    #[test]
    fn test_signing_domain() {
        let email = Email::new().from("no-reply@example.com");
        assert_eq!(email.signing_domain().unwrap(), "example.com");

        let email = Email::new().from("invalid@");
        assert!(matches!(email.signing_domain(), Err(MailError::InvalidFromAddress(_))));

        let email = Email::new().from("no-at-sign");
        assert!(matches!(email.signing_domain(), Err(MailError::InvalidFromAddress(_))));
    }

    #[test]
    fn test_add_attachment_preserves_order() {
        let mut email = valid_email();
        email.add_attachment("a.txt", "text/plain", std::io::Cursor::new(b"a".to_vec()));
        email.add_attachment("b.txt", "text/plain", std::io::Cursor::new(b"b".to_vec()));

        let names: Vec<&str> = email.attachments.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[test]
    fn test_lettre_message_headers() {
        let email = valid_email()
            .from_name("No Reply")
            .cc("cc@example.com")
            .bcc("bcc@example.com")
            .reply_to("support@example.com")
            .important(true);

        let raw = formatted(&email);
        assert!(raw.contains("no-reply@example.com"));
        assert!(raw.contains("No Reply"));
        assert!(raw.contains("To: recipient@example.com"));
        assert!(raw.contains("Cc: cc@example.com"));
        assert!(raw.contains("Bcc: bcc@example.com"));
        assert!(raw.contains("Reply-To: support@example.com"));
        assert!(raw.contains("X-Priority: 1 (Highest)"));
        assert!(raw.contains("X-MSMail-Priority: High"));
        assert!(raw.contains("Importance: High"));
    }

    #[test]
    fn test_lettre_message_without_priority() {
        let raw = formatted(&valid_email());
        assert!(!raw.contains("X-Priority"));
        assert!(!raw.contains("Bcc:"));
    }

    #[test]
    fn test_lettre_message_attachments() {
        let email = valid_email()
            .html("<p>Hello</p>")
            .attach(Attachment::from_bytes("first.txt", "text/plain", "one"))
            .attach(Attachment::from_bytes("second.pdf", "application/pdf", vec![0u8, 1, 2]));

        let raw = formatted(&email);
        let first = raw.find("first.txt").unwrap();
        let second = raw.find("second.pdf").unwrap();
        assert!(first < second);
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
    }

    #[test]
    fn test_lettre_message_invalid_address() {
        let email = valid_email().to("not an address");
        assert!(matches!(email.to_lettre(), Err(MailError::InvalidAddress(_))));
    }

    #[test]
    fn test_lettre_message_invalid_attachment_type() {
        let email = valid_email().attach(Attachment::from_bytes("x.bin", "not a mime type", "x"));
        assert!(matches!(email.to_lettre(), Err(MailError::Attachment(_))));
    }

    #[test]
    fn test_email_serializes_without_attachments() {
        let email = valid_email().attach(Attachment::from_bytes("a.txt", "text/plain", "a"));
        let json = serde_json::to_value(&email).unwrap();
        assert_eq!(json["subject"], "Test");
        assert!(json.get("attachments").is_none());
    }
}
