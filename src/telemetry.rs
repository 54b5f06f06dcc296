use std::{fmt, sync::Arc, time::Duration};

use crate::{errors::RetryMetadata, runs::RunStatus};

/// User-provided callbacks for emitting metrics without taking on a tracing dependency.
#[derive(Clone, Default)]
pub struct MetricsCallbacks {
    pub http_request: Option<Arc<dyn Fn(HttpRequestMetrics) + Send + Sync>>,
    pub run_finished: Option<Arc<dyn Fn(RunMetrics) + Send + Sync>>,
}

impl fmt::Debug for MetricsCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCallbacks")
            .field(
                "http_request",
                &self.http_request.as_ref().map(|_| "callback"),
            )
            .field(
                "run_finished",
                &self.run_finished.as_ref().map(|_| "callback"),
            )
            .finish()
    }
}

/// Common request metadata shared by all telemetry events.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    /// Actor, run or dataset id the request is about.
    pub resource_id: Option<String>,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_resource_id(mut self, resource_id: Option<&str>) -> Self {
        if let Some(id) = resource_id {
            if !id.trim().is_empty() {
                self.resource_id = Some(id.to_string());
            }
        }
        self
    }
}

/// HTTP request latency and outcome.
#[derive(Clone, Debug)]
pub struct HttpRequestMetrics {
    pub latency: Duration,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub retries: Option<RetryMetadata>,
    pub context: RequestContext,
}

/// Emitted once a polled run reaches a terminal status.
#[derive(Clone, Debug)]
pub struct RunMetrics {
    pub run_id: String,
    pub status: RunStatus,
    /// Number of status fetches performed, including the final one.
    pub polls: u32,
    pub elapsed: Duration,
}

/// Internal helper that owns the registered callbacks (if any).
#[derive(Clone, Default)]
pub(crate) struct Telemetry {
    callbacks: MetricsCallbacks,
}

impl Telemetry {
    pub fn new(callbacks: Option<MetricsCallbacks>) -> Self {
        Self {
            callbacks: callbacks.unwrap_or_default(),
        }
    }

    pub fn http_enabled(&self) -> bool {
        self.callbacks.http_request.is_some()
    }

    pub fn record_http(&self, metrics: HttpRequestMetrics) {
        if let Some(cb) = &self.callbacks.http_request {
            cb(metrics);
        }
    }

    pub fn record_run(&self, metrics: RunMetrics) {
        if let Some(cb) = &self.callbacks.run_finished {
            cb(metrics);
        }
    }
}
