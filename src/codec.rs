//! Content-type aware encoding for API payloads and gateway wire messages.

use axum::http::{header, HeaderMap};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use thiserror::Error;

pub const MIME_TYPE_JSON: &str = "application/json";
pub const MIME_TYPE_XML: &str = "application/xml";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("XML payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Wire format selected from a `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MimeType {
    #[default]
    Json,
    Xml,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Json => MIME_TYPE_JSON,
            MimeType::Xml => MIME_TYPE_XML,
        }
    }

    /// Parameters such as `charset` are ignored. Anything that is not XML is
    /// treated as JSON.
    pub fn from_content_type(value: Option<&str>) -> Self {
        let essence = value
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase());

        match essence.as_deref() {
            Some(MIME_TYPE_XML) | Some("text/xml") => MimeType::Xml,
            _ => MimeType::Json,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::from_content_type(
            headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        )
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn encode<T: Serialize>(format: MimeType, value: &T) -> Result<Vec<u8>, CodecError> {
    match format {
        MimeType::Json => Ok(serde_json::to_vec(value)?),
        MimeType::Xml => Ok(quick_xml::se::to_string(value)?.into_bytes()),
    }
}

pub fn decode<T: DeserializeOwned>(format: MimeType, body: &[u8]) -> Result<T, CodecError> {
    match format {
        MimeType::Json => Ok(serde_json::from_slice(body)?),
        MimeType::Xml => {
            let text = std::str::from_utf8(body)?;
            Ok(quick_xml::de::from_str(text)?)
        }
    }
}
