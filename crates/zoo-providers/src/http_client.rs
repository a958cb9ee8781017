use std::time::Duration;

use http::{HeaderMap, HeaderValue, header};
use reqwest::Client;

use crate::error::{GenerationError, Result};

/// User agent sent to every provider
pub const USER_AGENT: &str = concat!("zoo/", env!("CARGO_PKG_VERSION"));

/// Build the HTTP client shared by all adapters of one registry
///
/// The timeout bounds a single round trip; polling loops are unbounded.
pub fn build_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(30)))
        .tcp_nodelay(true)
        .default_headers(headers)
        .build()
        .map_err(|e| GenerationError::Configuration(format!("failed to build HTTP client: {e}")))
}
