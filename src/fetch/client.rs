// Public AT Protocol client — unauthenticated XRPC over HTTP.
//
// The graph endpoints used here (getProfile, getFollowers, getFollows) are
// public and don't require authentication. Non-success responses are
// classified into a FetchFailure so callers can report them by code.
// No retries: a failed page fails the whole fetch.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::FetchFailure;

/// Default public API endpoint for AT Protocol read operations.
pub const DEFAULT_PUBLIC_API_URL: &str = "https://public.api.bsky.app";

/// Unauthenticated HTTP client for public AT Protocol XRPC endpoints.
pub struct PublicAtpClient {
    client: reqwest::Client,
    base_url: String,
}

impl PublicAtpClient {
    /// Create a new public API client pointing at the given base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("followtrail/0.1 (follower-history)")
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request to an XRPC endpoint and deserialize the response.
    ///
    /// `nsid` is the XRPC method name (e.g. "app.bsky.graph.getFollowers").
    pub async fn xrpc_get<T: DeserializeOwned>(
        &self,
        nsid: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/xrpc/{}", self.base_url, nsid);

        debug!(nsid = nsid, "XRPC GET request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("XRPC request failed: {nsid}"))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let failure = classify_status(status, &body);
            return Err(anyhow::Error::new(failure)
                .context(format!("XRPC {nsid} returned {status}: {body}")));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to deserialize {nsid} response"))
    }
}

/// Map an XRPC error response onto the fetch failure taxonomy.
///
/// The AppView answers unknown actors with `400 InvalidRequest` and a
/// "Profile not found" message rather than a 404.
pub fn classify_status(status: u16, body: &str) -> FetchFailure {
    match status {
        401 | 403 => FetchFailure::NotLoggedIn,
        404 => FetchFailure::UserNotFound,
        429 => FetchFailure::RateLimited,
        400 if body.to_ascii_lowercase().contains("not found") => FetchFailure::UserNotFound,
        other => FetchFailure::Http(other),
    }
}
