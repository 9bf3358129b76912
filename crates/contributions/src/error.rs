//! Error taxonomy for a contributions scan.

use thiserror::Error;

use crate::http::HttpError;

/// Errors that can occur while discovering repositories or fetching stats.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Missing or unusable configuration (e.g. no API token).
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The query endpoint answered without a `data` payload.
    #[error("GraphQL request failed: {message}")]
    Protocol { message: String },

    /// The server answered with a status the caller does not handle.
    #[error("unexpected response status {status}: {body}")]
    Transport { status: u16, body: String },

    /// Connection-level failure (DNS, reset, timeout).
    #[error(transparent)]
    Http(#[from] HttpError),

    /// A response body could not be decoded.
    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ScanError {
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    #[inline]
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status,
            body: body.into(),
        }
    }

    #[inline]
    pub fn decode(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source,
        }
    }
}

/// First line of an error's display string, for progress events and logs.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for scan operations.
pub type Result<T> = std::result::Result<T, ScanError>;
