//! Email attachments.

use base64::Engine;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Mutex;

use crate::{MailError, Result};

/// An email attachment backed by a single-use byte stream.
///
/// The stream is drained by whichever adapter sends the email. It is not
/// rewound afterwards: a second read yields whatever is left, usually nothing.
pub struct Attachment {
    /// File name.
    pub file_name: String,
    /// MIME type.
    pub file_type: String,
    reader: Mutex<Box<dyn Read + Send>>,
}

impl Attachment {
    /// Create a new attachment from a reader.
    pub fn new(
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_type: file_type.into(),
            reader: Mutex::new(Box::new(reader)),
        }
    }

    /// Create an attachment from bytes already held in memory.
    pub fn from_bytes(
        file_name: impl Into<String>,
        file_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        Self::new(file_name, file_type, Cursor::new(data.into()))
    }

    /// Create an attachment from a file path, guessing the MIME type.
    ///
    /// The file is opened now and read when the email is sent.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| MailError::Attachment("Invalid file name".to_string()))?
            .to_string();

        let file_type = mime_guess::from_path(path)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let file = std::fs::File::open(path)?;

        Ok(Self::new(file_name, file_type, file))
    }

    /// Drain the stream and return its bytes.
    pub fn read_content(&self) -> Result<Vec<u8>> {
        let mut reader = self.reader.lock().map_err(|_| {
            MailError::Attachment(format!("reader for {} is poisoned", self.file_name))
        })?;

        let mut content = Vec::new();
        reader.read_to_end(&mut content).map_err(|e| {
            MailError::Attachment(format!("failed to read {}: {}", self.file_name, e))
        })?;

        Ok(content)
    }

    /// Drain the stream and return its bytes encoded as standard base64.
    pub fn read_base64(&self) -> Result<String> {
        let content = self.read_content()?;
        Ok(base64::engine::general_purpose::STANDARD.encode(content))
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("file_name", &self.file_name)
            .field("file_type", &self.file_type)
            .finish_non_exhaustive()
    }
}
