//! One feed's fetch + parse behavior: a single GET, normalization, and the
//! publication-window filter.
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::error::{ErrorKind, WorkerError};
use crate::domain::model::{FeedConfig, FeedItem};
use crate::feed::parser;
use crate::ports::http::Http;

/// Items published more than this long before the fetch are ignored.
const PUBLICATION_WINDOW_HOURS: i64 = 24;

pub struct FeedSource<'a, H> {
    config: &'a FeedConfig,
    http: &'a H,
}

impl<'a, H: Http> FeedSource<'a, H> {
    pub fn new(config: &'a FeedConfig, http: &'a H) -> Self {
        Self { config, http }
    }

    /// Fetches and parses the configured url, returning normalized items
    /// published within the window. Entries without a usable title, link, or
    /// date are dropped.
    pub async fn fetch(&self, now: DateTime<Utc>) -> Result<Vec<FeedItem>, WorkerError> {
        let response = self.http.get(&self.config.url).await;

        if let Some(error) = response.error {
            return Err(self.error(ErrorKind::FetchUrl, format!("request failed: {error}")));
        }
        match response.status {
            Some(200) => {}
            Some(code) => {
                return Err(self.error(ErrorKind::FetchUrl, format!("unexpected status {code}")))
            }
            None => return Err(self.error(ErrorKind::FetchUrl, "no response status".to_string())),
        }
        let body = response
            .body
            .ok_or_else(|| self.error(ErrorKind::FetchUrl, "empty response body".to_string()))?;

        let parsed = parser::parse(&body).map_err(|e| self.error(ErrorKind::ParseUrl, e))?;
        if parsed.is_empty() {
            return Err(self.error(ErrorKind::ParseUrl, "feed yielded no items".to_string()));
        }

        let cutoff = now - Duration::hours(PUBLICATION_WINDOW_HOURS);
        let total = parsed.len();
        let items: Vec<FeedItem> = parsed
            .into_iter()
            .filter_map(|raw| {
                let title = raw.title.filter(|t| !t.trim().is_empty())?;
                let url = raw.link.filter(|l| !l.trim().is_empty())?;
                let date = raw.published.filter(|d| *d >= cutoff)?;
                Some(FeedItem {
                    title,
                    url,
                    date: Some(date),
                    category: self.config.category,
                    website: self.config.id,
                })
            })
            .collect();

        debug!(
            url = %self.config.url,
            parsed = total,
            kept = items.len(),
            latency_ms = response.latency_ms,
            "Fetched feed"
        );
        Ok(items)
    }

    fn error(&self, kind: ErrorKind, message: String) -> WorkerError {
        WorkerError::for_feed(kind, message, &self.config.url, self.config.id)
    }
}
