//! HTTP client module for talking to the marketplace backend.
//!
//! This module provides:
//! - Client construction from [`ApiSettings`] (timeouts, user agent, TLS)
//! - Transport-level retries with exponential backoff for idempotent reads
//!
//! # Example
//! ```no_run
//! use smsdesk_config::http::{HttpClientParams, build_http_client};
//! use smsdesk_config::ApiSettings;
//!
//! let settings = ApiSettings::new("https://api.example.com");
//! let client = build_http_client(HttpClientParams::from_settings(&settings)).unwrap();
//! ```
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use tracing::warn;

use crate::ApiSettings;

/// Parameters for configuring an HTTP client.
#[derive(Debug, Clone)]
pub struct HttpClientParams<'a> {
    pub timeout: u64,
    pub connect_timeout: u64,
    pub user_agent: &'a str,
}

impl<'a> HttpClientParams<'a> {
    pub fn from_settings(settings: &'a ApiSettings) -> Self {
        Self {
            timeout: settings.timeout,
            connect_timeout: settings.connect_timeout,
            user_agent: &settings.user_agent,
        }
    }
}

/// Builds an HTTP client with the specified parameters.
///
/// The `timeout` is a hard abort for the whole request, so a hung backend
/// never keeps a caller waiting longer than that.
pub fn build_http_client(params: HttpClientParams) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::ClientBuilder::new()
        .use_rustls_tls()
        .gzip(true)
        .timeout(Duration::from_secs(params.timeout))
        .connect_timeout(Duration::from_secs(params.connect_timeout))
        .user_agent(params.user_agent)
        .build()
}

/// Sends a request with automatic retries on transport failures.
///
/// `build` is called once per attempt. Only connect errors and timeouts are
/// retried; any response the server produced, error statuses included, is
/// handed back as is. Use it for idempotent requests only.
pub async fn send_with_retry<F>(
    build: F,
    max_elapsed: Duration,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(Duration::from_millis(200))
        .with_max_interval(Duration::from_secs(2))
        .with_max_elapsed_time(Some(max_elapsed))
        .build();

    backoff::future::retry(backoff, || async {
        build().send().await.map_err(|err| {
            if is_transient(&err) {
                warn!("transient http error, retrying: {err}");
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            }
        })
    })
    .await
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
