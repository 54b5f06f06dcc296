//! Helpers for tests against a mock API server.

use crate::{Client, Config, Credentials, RetryConfig};

/// Create a test client configured to use a wiremock server.
/// Disables retries by default for predictable test behavior.
pub fn test_client(base_url: &str) -> Client {
    Client::new(Config {
        base_url: Some(base_url.to_string()),
        credentials: Credentials::api_token("apify_api_test").expect("api token"),
        retry: Some(RetryConfig::disabled()),
        ..Default::default()
    })
    .expect("client")
}

/// Like [`test_client`], with the integration app id header set.
pub fn test_client_with_app_id(base_url: &str, app_id: &str) -> Client {
    Client::new(Config {
        base_url: Some(base_url.to_string()),
        credentials: Credentials::api_token("apify_api_test").expect("api token"),
        app_id: Some(app_id.to_string()),
        retry: Some(RetryConfig::disabled()),
        ..Default::default()
    })
    .expect("client")
}
