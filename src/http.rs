use std::time::Duration;

use reqwest::{Method, StatusCode};

use crate::errors::{APIError, Error, RetryMetadata};

/// Retry/backoff configuration.
///
/// Requests are not retried unless the caller opts in: the default is a single
/// attempt. Run creation is never retried whatever this says.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub retry_post: bool,
}

impl RetryConfig {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Whether the given status code should trigger a retry for this method.
    pub fn should_retry_status(&self, method: &Method, status: StatusCode) -> bool {
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
            return self.allow_for_method(method);
        }
        if status.is_server_error() {
            return self.allow_for_method(method);
        }
        false
    }

    /// Whether the given transport error should trigger a retry.
    pub fn should_retry_error(&self, method: &Method, err: &reqwest::Error) -> bool {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            return self.allow_for_method(method);
        }
        false
    }

    /// Jittered exponential backoff for the given attempt (1-indexed).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = if attempt == 0 {
            0
        } else {
            (attempt - 1).min(10)
        };
        let base = self.base_backoff.saturating_mul(2u32.saturating_pow(exp));
        let capped = std::cmp::min(base, self.max_backoff);
        let jitter = 0.5 + fastrand::f64(); // 0.5x .. 1.5x
        let seconds = (capped.as_secs_f64() * jitter).min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(seconds)
    }

    fn allow_for_method(&self, method: &Method) -> bool {
        if method == Method::POST {
            return self.retry_post;
        }
        true
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(5),
            retry_post: false,
        }
    }
}

/// Structured header list with validation.
#[derive(Clone, Debug, Default)]
pub struct HeaderList(Vec<HeaderEntry>);

impl HeaderList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add a header entry.
    ///
    /// # Panics
    /// Panics if the header key or value is empty or contains only whitespace.
    pub fn push(&mut self, entry: HeaderEntry) {
        assert!(
            entry.is_valid(),
            "Invalid header: key and value must be non-empty (got key={:?}, value={:?})",
            entry.key,
            entry.value
        );
        self.0.push(entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderEntry> {
        self.0.iter()
    }
}

#[derive(Clone, Debug)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: String, value: String) -> Self {
        Self { key, value }
    }

    pub fn is_valid(&self) -> bool {
        !(self.key.trim().is_empty() || self.value.trim().is_empty())
    }
}

/// Builds an [`APIError`] from a failed response.
///
/// Understands the `{"error": {"type", "message"}}` envelope and falls back to
/// a top-level `message` or the raw body.
pub(crate) fn parse_api_error_parts(
    status: StatusCode,
    body: String,
    retries: Option<RetryMetadata>,
) -> Error {
    let status_code = status.as_u16();
    let status_text = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();

    if body.is_empty() {
        return APIError {
            status: status_code,
            error_type: None,
            message: status_text,
            request: None,
            retries,
            raw_body: None,
        }
        .into();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(err_obj) = value.get("error").and_then(|v| v.as_object()) {
            let error_type = err_obj
                .get("type")
                .or_else(|| err_obj.get("code"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            let message = err_obj
                .get("message")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| status_text.clone());
            return APIError {
                status: status_code,
                error_type,
                message,
                request: None,
                retries,
                raw_body: Some(body.clone()),
            }
            .into();
        }

        if let Some(message) = value.get("message").and_then(|v| v.as_str()) {
            let error_type = value
                .get("type")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            return APIError {
                status: status_code,
                error_type,
                message: message.to_string(),
                request: None,
                retries,
                raw_body: Some(body.clone()),
            }
            .into();
        }
    }

    APIError {
        status: status_code,
        error_type: None,
        message: body.clone(),
        request: None,
        retries,
        raw_body: Some(body),
    }
    .into()
}
