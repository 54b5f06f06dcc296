use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Retry metadata surfaced on transport/API errors when retries were attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryMetadata {
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Structured validation error raised before a request leaves the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "{}: {}", field, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<String> for ValidationError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ValidationError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Error returned by the remote API (non-2xx response).
///
/// The API answers failures with `{"error": {"type": "...", "message": "..."}}`;
/// both parts are kept together with the request that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct APIError {
    pub status: u16,
    /// Machine-readable error type, e.g. `record-not-found`.
    pub error_type: Option<String>,
    pub message: String,
    /// `METHOD /path` of the failed request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<RetryMetadata>,
    /// Raw response body for debugging (when available).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

impl APIError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type: None,
            message: message.into(),
            request: None,
            retries: None,
            raw_body: None,
        }
    }

    pub fn with_request(mut self, method: &str, path: &str) -> Self {
        self.request = Some(format!("{method} {path}"));
        self
    }
}

impl fmt::Display for APIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(error_type) = &self.error_type {
            write!(f, "{} ({}): {}", error_type, self.status, self.message)?;
        } else {
            write!(f, "{}: {}", self.status, self.message)?;
        }
        if let Some(request) = &self.request {
            write!(f, " [{request}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for APIError {}

/// Convenience alias for fallible results.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Transport-level error (timeouts, DNS/TLS/connectivity).
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    pub source: Option<reqwest::Error>,
    pub retries: Option<RetryMetadata>,
}

/// Broad transport error kinds for classification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Request => "request",
            TransportErrorKind::Other => "transport",
        };
        write!(f, "{label}")
    }
}

/// Unified error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid client configuration (credentials, base url, headers).
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Api(#[from] APIError),

    #[error("{0}")]
    Transport(#[from] TransportError),

    /// A successful response lacked a value the flow depends on.
    #[error("response missing {field}: {context}")]
    MissingField {
        field: &'static str,
        context: String,
    },

    /// Fetching the status of a run failed while waiting for it to finish.
    #[error("error polling run status for run {run_id}: {source}")]
    Poll {
        run_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("actor {actor_id} run {run_id} did not finish within {elapsed:?}")]
    ExecutionTimeout {
        actor_id: String,
        run_id: String,
        elapsed: Duration,
    },
}

impl Error {
    /// HTTP status of the underlying API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api(err) => Some(err.status),
            Error::Poll { source, .. } => source.status(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_formats_with_field() {
        let err = ValidationError::new("is not declared by the input schema").with_field("foo");
        assert_eq!(err.to_string(), "foo: is not declared by the input schema");
    }

    #[test]
    fn api_error_keeps_type_request_and_body() {
        let api_err = APIError {
            status: 404,
            error_type: Some("record-not-found".into()),
            message: "Actor was not found".into(),
            request: None,
            retries: None,
            raw_body: Some("{\"error\":{}}".into()),
        }
        .with_request("GET", "/v2/acts/abc/builds/default");

        assert_eq!(
            api_err.to_string(),
            "record-not-found (404): Actor was not found [GET /v2/acts/abc/builds/default]"
        );
        assert!(api_err.raw_body.is_some());
    }

    #[test]
    fn poll_error_names_run_and_exposes_status() {
        let err = Error::Poll {
            run_id: "run_1".into(),
            source: Box::new(Error::Api(APIError::new(500, "boom"))),
        };
        assert!(err.to_string().contains("run_1"));
        assert_eq!(err.status(), Some(500));
    }
}
