//! Error types for the portal client layer.

use thiserror::Error;

/// Session construction and configuration failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid base URL: {input}: {reason}")]
    InvalidBaseUrl { input: String, reason: String },

    #[error("Failed to build HTTP client: {source}")]
    Build { source: reqwest::Error },
}

/// Transport-level failure for one HTTP exchange, classified so the retry
/// layer can tell terminal certificate problems from transient faults.
///
/// Carries the formatted error text rather than the underlying
/// `reqwest::Error`, which cannot be constructed outside reqwest and would
/// make scripted transports impossible to write.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("TLS error: {url}: {message}")]
    Tls { url: String, message: String },

    #[error("Timed out: {url}: {message}")]
    Timeout { url: String, message: String },

    #[error("Connection error: {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Network error: {url}: {message}")]
    Other { url: String, message: String },
}

impl TransportError {
    /// Classify a reqwest error for the request against `url`.
    ///
    /// Certificate problems hide behind reqwest's opaque source chain, so
    /// TLS detection scans the chain text: rustls reports "invalid peer
    /// certificate", native backends report variants of "certificate
    /// verify failed".
    pub fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        let url = url.to_string();
        let message = source.to_string();
        if is_certificate_error(&source) {
            TransportError::Tls { url, message }
        } else if source.is_timeout() {
            TransportError::Timeout { url, message }
        } else if source.is_connect() {
            TransportError::Connect { url, message }
        } else {
            TransportError::Other { url, message }
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, TransportError::Tls { .. })
    }
}

fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.to_string().to_lowercase().contains("certificate") {
            return true;
        }
        source = std::error::Error::source(e);
    }
    false
}
