//! Data-URL payloads for binary file content
//!
//! Images and fonts are stored as `data:<mime>;base64,<payload>` so the whole
//! project stays representable as text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::{BuildoraError, Result};

/// Borrowed view over a parsed data URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUrl<'a> {
    pub mime: &'a str,
    pub data: &'a str,
}

impl<'a> DataUrl<'a> {
    /// Parse `data:<mime>;base64,<payload>`; non-base64 data URLs are rejected
    pub fn parse(text: &'a str) -> Option<Self> {
        let rest = text.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        Some(Self { mime, data })
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|e| BuildoraError::InvalidPayload(e.to_string()))
    }
}

/// Encode raw bytes as a base64 data URL
pub fn encode(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Decode a data URL's payload into raw bytes
pub fn decode(text: &str) -> Result<Vec<u8>> {
    DataUrl::parse(text)
        .ok_or_else(|| {
            BuildoraError::InvalidPayload(format!(
                "expected a base64 data URL, got {} bytes of text",
                text.len()
            ))
        })?
        .decode()
}

/// Data-URL form of a binary file's content; existing payloads pass through
pub fn ensure_encoded(name: &str, content: String) -> String {
    if DataUrl::parse(&content).is_some() {
        content
    } else {
        encode(&mime_for_name(name), content.as_bytes())
    }
}

/// Best-effort MIME type for a file name
pub fn mime_for_name(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
