use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use reqwest::{
    header::{HeaderName, HeaderValue, ACCEPT, USER_AGENT},
    Method, StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::time::sleep;

use crate::{
    actors::ActorsClient,
    auth::{Authentication, Credentials, Token},
    datasets::DatasetsClient,
    errors::{Error, Result, RetryMetadata, TransportError, TransportErrorKind},
    http::{parse_api_error_parts, HeaderList, RetryConfig},
    runs::RunsClient,
    telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, Telemetry},
    APP_ID_HEADER, DEFAULT_BASE_URL, DEFAULT_CLIENT_HEADER, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_PLATFORM, DEFAULT_REQUEST_TIMEOUT, PLATFORM_HEADER,
};

#[derive(Clone, Debug, Default)]
pub struct Config {
    pub base_url: Option<String>,
    pub credentials: Credentials,
    /// Which of the configured credentials authenticates requests.
    pub authentication: Authentication,
    /// Value of the integration platform header (defaults to `n8n`).
    pub platform: Option<String>,
    /// Value of the integration app id header; omitted when unset.
    pub app_id: Option<String>,
    /// Override the User-Agent header.
    pub client_header: Option<String>,
    pub http_client: Option<reqwest::Client>,
    /// Override the connect timeout (defaults to 5s).
    pub connect_timeout: Option<Duration>,
    /// Override the request timeout (defaults to 60s).
    pub timeout: Option<Duration>,
    /// Retry/backoff policy (defaults to a single attempt).
    pub retry: Option<RetryConfig>,
    /// Default extra headers applied to all requests.
    pub default_headers: Option<HeaderList>,
    /// Optional metrics callbacks (HTTP latency, finished runs).
    pub metrics: Option<MetricsCallbacks>,
}

/// Authenticated API client. Cheap to clone; all clones share one connection pool.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    base_url: reqwest::Url,
    token: Token,
    platform: String,
    app_id: Option<String>,
    client_header: String,
    http: reqwest::Client,
    request_timeout: Duration,
    pub(crate) retry: RetryConfig,
    default_headers: Option<HeaderList>,
    pub(crate) telemetry: Telemetry,
}

impl Client {
    pub fn new(cfg: Config) -> Result<Self> {
        let base_source = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        // Url::join drops the last segment of a base without a trailing slash.
        let base = format!("{}/", base_source.trim_end_matches('/'));
        let base_url = reqwest::Url::parse(&base)
            .map_err(|err| Error::Config(format!("invalid base url: {err}")))?;

        let token = cfg.credentials.resolve(cfg.authentication)?.clone();

        let connect_timeout = cfg.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let request_timeout = cfg.timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let retry = cfg.retry.unwrap_or_default();

        let http = match cfg.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .connect_timeout(connect_timeout)
                .build()
                .map_err(|err| TransportError {
                    kind: TransportErrorKind::Connect,
                    message: "failed to build http client".to_string(),
                    source: Some(err),
                    retries: None,
                })?,
        };

        let platform = cfg
            .platform
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLATFORM.to_string());
        let client_header = cfg
            .client_header
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CLIENT_HEADER.to_string());

        Ok(Self {
            inner: Arc::new(ClientInner {
                base_url,
                token,
                platform,
                app_id: cfg.app_id.filter(|s| !s.trim().is_empty()),
                client_header,
                http,
                request_timeout,
                retry,
                default_headers: cfg.default_headers,
                telemetry: Telemetry::new(cfg.metrics),
            }),
        })
    }

    pub fn actors(&self) -> ActorsClient {
        ActorsClient {
            inner: self.inner.clone(),
        }
    }

    pub fn runs(&self) -> RunsClient {
        RunsClient {
            inner: self.inner.clone(),
        }
    }

    pub fn datasets(&self) -> DatasetsClient {
        DatasetsClient {
            inner: self.inner.clone(),
        }
    }
}

fn apply_header_list(
    mut builder: reqwest::RequestBuilder,
    headers: &HeaderList,
) -> Result<reqwest::RequestBuilder> {
    for entry in headers.iter() {
        if !entry.is_valid() {
            continue;
        }
        let name = HeaderName::from_bytes(entry.key.trim().as_bytes())
            .map_err(|err| Error::Config(format!("invalid header name: {err}")))?;
        let val = HeaderValue::from_str(entry.value.trim())
            .map_err(|err| Error::Config(format!("invalid header value: {err}")))?;
        builder = builder.header(name, val);
    }
    Ok(builder)
}

/// `{"data": ...}` wrapper used by single-resource endpoints.
#[derive(Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: Option<T>,
}

impl ClientInner {
    pub(crate) fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| Error::Config(format!("invalid path: {err}")))?;
        Ok(self.http.request(method, url))
    }

    pub(crate) fn with_headers(
        &self,
        mut builder: reqwest::RequestBuilder,
        accept: Option<&str>,
    ) -> Result<reqwest::RequestBuilder> {
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        builder = builder
            .header(USER_AGENT, self.client_header.as_str())
            .header(PLATFORM_HEADER, self.platform.as_str());
        if let Some(app_id) = self.app_id.as_deref() {
            builder = builder.header(APP_ID_HEADER, app_id);
        }
        builder = builder.bearer_auth(self.token.as_str());

        if let Some(defaults) = &self.default_headers {
            builder = apply_header_list(builder, defaults)?;
        }
        Ok(builder)
    }

    pub(crate) fn with_timeout(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Option<Duration>,
    ) -> reqwest::RequestBuilder {
        builder.timeout(timeout.unwrap_or(self.request_timeout))
    }

    pub(crate) fn make_context(
        &self,
        method: &Method,
        path: &str,
        resource_id: Option<&str>,
    ) -> RequestContext {
        RequestContext::new(method.as_str(), path).with_resource_id(resource_id)
    }

    /// Prepares a JSON request: url, standard headers and default timeout.
    pub(crate) fn json_request(
        &self,
        method: Method,
        path: &str,
    ) -> Result<reqwest::RequestBuilder> {
        let builder = self.request(method, path)?;
        let builder = self.with_headers(builder, Some("application/json"))?;
        Ok(self.with_timeout(builder, None))
    }

    pub(crate) async fn execute_json<T: DeserializeOwned>(
        &self,
        builder: reqwest::RequestBuilder,
        method: Method,
        retry: Option<RetryConfig>,
        ctx: RequestContext,
    ) -> Result<T> {
        let retry_cfg = retry.unwrap_or_else(|| self.retry.clone());
        let resp = self
            .send_with_retry(builder, method, retry_cfg, ctx)
            .await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|err| self.to_transport_error(err, None))?;
        let parsed = serde_json::from_slice::<T>(&bytes).map_err(Error::Serialization)?;
        Ok(parsed)
    }

    pub(crate) async fn send_with_retry(
        &self,
        builder: reqwest::RequestBuilder,
        method: Method,
        retry: RetryConfig,
        ctx: RequestContext,
    ) -> Result<reqwest::Response> {
        let max_attempts = retry.max_attempts.max(1);
        let mut state = RetryState::new();
        let start = Instant::now();

        for attempt in 1..=max_attempts {
            let attempt_builder = builder
                .try_clone()
                .ok_or_else(|| Error::Config("request body is not cloneable for retry".into()))?;
            #[cfg(feature = "tracing")]
            let span = tracing::debug_span!(
                "apify.http",
                method = %ctx.method,
                path = %ctx.path,
                attempt,
                max_attempts
            );
            #[cfg(feature = "tracing")]
            let _guard = span.enter();
            let result = attempt_builder.send().await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        if self.telemetry.http_enabled() {
                            self.telemetry.record_http(HttpRequestMetrics {
                                latency: start.elapsed(),
                                status: Some(status.as_u16()),
                                error: None,
                                retries: state.metadata(),
                                context: ctx.clone(),
                            });
                        }
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            status = %status,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "request completed"
                        );
                        return Ok(resp);
                    }
                    state.record_attempt(attempt);
                    state.record_status(status);

                    let should_retry = retry.should_retry_status(&method, status);
                    if should_retry && attempt < max_attempts {
                        sleep(retry.backoff_delay(attempt)).await;
                        continue;
                    }

                    let retries = state.metadata();
                    if self.telemetry.http_enabled() {
                        self.telemetry.record_http(HttpRequestMetrics {
                            latency: start.elapsed(),
                            status: Some(status.as_u16()),
                            error: Some(format!("http {}", status.as_u16())),
                            retries: retries.clone(),
                            context: ctx.clone(),
                        });
                    }
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        status = %status,
                        attempt,
                        "request failed; returning error"
                    );
                    let body = resp.text().await.unwrap_or_default();
                    return Err(match parse_api_error_parts(status, body, retries) {
                        Error::Api(api) => Error::Api(api.with_request(&ctx.method, &ctx.path)),
                        other => other,
                    });
                }
                Err(err) => {
                    state.record_attempt(attempt);
                    state.record_error(&err);
                    let should_retry = retry.should_retry_error(&method, &err);
                    if should_retry && attempt < max_attempts {
                        sleep(retry.backoff_delay(attempt)).await;
                        continue;
                    }

                    let retries = state.metadata();
                    if self.telemetry.http_enabled() {
                        self.telemetry.record_http(HttpRequestMetrics {
                            latency: start.elapsed(),
                            status: None,
                            error: Some(err.to_string()),
                            retries: retries.clone(),
                            context: ctx.clone(),
                        });
                    }
                    #[cfg(feature = "tracing")]
                    tracing::warn!(attempt, error = %err, "transport error");
                    return Err(self.to_transport_error(err, retries));
                }
            }
        }

        Err(Error::Transport(TransportError {
            kind: TransportErrorKind::Other,
            message: "request failed".to_string(),
            source: None,
            retries: state.metadata(),
        }))
    }

    pub(crate) fn to_transport_error(
        &self,
        err: reqwest::Error,
        retries: Option<RetryMetadata>,
    ) -> Error {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };

        TransportError {
            kind,
            message: err.to_string(),
            source: Some(err),
            retries,
        }
        .into()
    }
}

#[derive(Default)]
struct RetryState {
    attempts: u32,
    last_status: Option<u16>,
    last_error: Option<String>,
}

impl RetryState {
    fn new() -> Self {
        Self::default()
    }

    fn record_attempt(&mut self, attempt: u32) {
        self.attempts = attempt;
    }

    fn record_status(&mut self, status: StatusCode) {
        self.last_status = Some(status.as_u16());
    }

    fn record_error(&mut self, err: &reqwest::Error) {
        self.last_error = Some(err.to_string());
    }

    fn metadata(&self) -> Option<RetryMetadata> {
        if self.attempts <= 1 {
            None
        } else {
            Some(RetryMetadata {
                attempts: self.attempts,
                last_status: self.last_status,
                last_error: self.last_error.clone(),
            })
        }
    }
}
