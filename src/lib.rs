//! Rust SDK for turning Apify actors into workflow nodes.
//!
//! [`map_schema`] converts an actor's input schema into form field
//! descriptors. [`ActorRunner`] runs the actor for each input item: it merges
//! build prefills with the user's values, starts the run, polls it to a
//! terminal status and returns the dataset items.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::result_large_err)]

use std::time::Duration;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.apify.com";

/// Default User-Agent header value.
pub(crate) const DEFAULT_CLIENT_HEADER: &str =
    concat!("apify-actor-node-rust/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between run status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Header naming the integration platform.
pub const PLATFORM_HEADER: &str = "x-apify-integration-platform";

/// Header naming the integration app.
pub const APP_ID_HEADER: &str = "x-apify-integration-app-id";

/// Platform reported when none is configured.
pub const DEFAULT_PLATFORM: &str = "n8n";

mod actors;
mod auth;
mod client;
mod datasets;
mod errors;
mod executor;
mod http;
mod mapper;
mod merge;
mod node;
mod pagination;
mod runs;
mod schema;
mod telemetry;
#[doc(hidden)]
pub mod testing;

pub use actors::{
    Actor, ActorDefinition, ActorsClient, Build, DefaultRunOptions, StartRunOptions, TaggedBuild,
    LATEST_BUILD_TAG,
};
pub use auth::{Authentication, Credentials, Token};
pub use client::{Client, Config};
pub use datasets::{DatasetsClient, ListItemsOptions, OutputMode, ResultItem};
pub use errors::{
    APIError, Error, Result, RetryMetadata, TransportError, TransportErrorKind, ValidationError,
};
pub use executor::{ActorRunner, ExecutionConfig, OutputItem, DEFAULT_BUILD_TAG};
pub use http::{HeaderEntry, HeaderList, RetryConfig};
pub use mapper::{
    map_field, map_schema, ChoiceOption, CollectionField, CollectionGroup, CollectionOptions,
    FieldDescriptor, MappedSchema, MappingWarning, NumberOptions, TextOptions, Unpack, Widget,
    MULTILINE_ROWS,
};
pub use merge::{
    default_input_from_build, default_input_from_schema, is_unset, merge, resolve_user_values,
    unpack_collection, RunRequest,
};
pub use node::{emit_properties, NodeConfig};
pub use pagination::{paginate_all, PaginatedList, Paginator, DEFAULT_PAGE_LIMIT};
pub use runs::{RunRecord, RunStatus, RunsClient};
pub use schema::{Editor, FieldType, InputSchema, InputSchemaField, ItemsSchema};
pub use telemetry::{HttpRequestMetrics, MetricsCallbacks, RequestContext, RunMetrics};
