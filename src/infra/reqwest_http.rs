//! Reqwest-backed HTTP client implementing the `Http` port.
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use tracing::{debug, warn};

use crate::ports::http::{FetchResponse, Http};

/// MIME types advertised when fetching a feed document.
pub const FEED_ACCEPT: &str = "text/html, application/xhtml+xml, application/xml, text/xml, application/atom+xml, application/rss+xml";

pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .pool_idle_timeout(Duration::from_secs(120))
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Http for ReqwestHttp {
    async fn get(&self, url: &str) -> FetchResponse {
        let start = tokio::time::Instant::now();
        debug!(url, "HTTP GET start");
        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = Some(resp.status().as_u16());
                let body = match resp.bytes().await {
                    Ok(b) => Some(b.to_vec()),
                    Err(e) => {
                        warn!(url, error = %e, "Failed reading body");
                        None
                    }
                };
                FetchResponse {
                    status,
                    body,
                    error: None,
                    latency_ms: start.elapsed().as_millis() as u64,
                }
            }
            Err(e) => {
                warn!(url, error = %e, "HTTP GET failed");
                FetchResponse {
                    status: e.status().map(|s| s.as_u16()),
                    body: None,
                    error: Some(e.to_string()),
                    latency_ms: start.elapsed().as_millis() as u64,
                }
            }
        }
    }
}
