//! HTTP client for the server status API

use super::{FetchError, RosterSource};
use crate::roster::{RosterResponse, RosterSnapshot};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout for roster fetches
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches the roster with a single GET per call
///
/// There are no retries here: a failed fetch is retried by the next tick.
pub struct UpstreamClient {
    client: Client,
    url: String,
    timeout: Duration,
}

impl UpstreamClient {
    /// Create a client for the given status endpoint
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(url: impl Into<String>, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder()
            .default_headers({
                let mut headers = header::HeaderMap::new();
                headers.insert(
                    header::USER_AGENT,
                    header::HeaderValue::from_static(concat!(
                        "rosterwatch/",
                        env!("CARGO_PKG_VERSION")
                    )),
                );
                headers.insert(
                    header::ACCEPT,
                    header::HeaderValue::from_static("application/json"),
                );
                headers
            })
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the current roster
    pub async fn fetch(&self) -> Result<RosterSnapshot, FetchError> {
        debug!(url = %self.url, "Fetching server roster");

        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(
                url = %self.url,
                status = status.as_u16(),
                "Roster endpoint returned non-success status"
            );
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: RosterResponse = serde_json::from_slice(&body)?;
        let servers = parsed.servers.unwrap_or_default();

        debug!(servers = servers.len(), "Roster fetched");
        Ok(RosterSnapshot::new(servers, Utc::now()))
    }
}

#[async_trait]
impl RosterSource for UpstreamClient {
    async fn fetch(&self) -> Result<RosterSnapshot, FetchError> {
        UpstreamClient::fetch(self).await
    }
}
