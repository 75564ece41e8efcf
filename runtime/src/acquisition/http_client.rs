//! Async HTTP client wrapping reqwest.
//!
//! Not a browser, just a single GET per page. A non-success status is an
//! error; the only fallback is one HTTP/1.1 retry on protocol errors.

use crate::error::{HarvestError, HarvestResult};
use std::time::Duration;
use tracing::debug;

/// Response from an HTTP GET request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after redirects.
    pub final_url: String,
    /// Response body as text.
    pub body: String,
}

/// HTTP client for static harvests.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    /// HTTP/1.1-only fallback client for sites that reject HTTP/2.
    h1_client: reqwest::Client,
}

impl HttpClient {
    /// Create a new HTTP client with standard Chrome user-agent.
    pub fn new(timeout_ms: u64) -> Self {
        let ua = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                  AppleWebKit/537.36 (KHTML, like Gecko) \
                  Chrome/131.0.0.0 Safari/537.36";

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .build()
            .unwrap_or_default();

        let h1_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(ua)
            .http1_only()
            .build()
            .unwrap_or_default();

        Self { client, h1_client }
    }

    /// Fetch a page. Fails on transport errors and non-success statuses.
    ///
    /// Falls back to HTTP/1.1 once on protocol errors (some CDNs reject HTTP/2).
    pub async fn get(&self, url: &str) -> HarvestResult<HttpResponse> {
        match self.get_inner(&self.client, url).await {
            Err(HarvestError::Fetch { source, .. }) if looks_like_protocol_error(&source) => {
                debug!(url, error = %source, "retrying over HTTP/1.1");
                self.get_inner(&self.h1_client, url).await
            }
            other => other,
        }
    }

    async fn get_inner(&self, client: &reqwest::Client, url: &str) -> HarvestResult<HttpResponse> {
        let fetch_err = |source| HarvestError::Fetch {
            url: url.to_string(),
            source,
        };

        let r = client.get(url).send().await.map_err(fetch_err)?;

        let status = r.status();
        if !status.is_success() {
            return Err(HarvestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = r.url().to_string();
        let body = r.text().await.map_err(fetch_err)?;

        Ok(HttpResponse { final_url, body })
    }
}

fn looks_like_protocol_error(err: &reqwest::Error) -> bool {
    let msg = format!("{err:?}");
    msg.contains("http2") || msg.contains("protocol") || msg.contains("connection closed")
}
