//! Per-tick workflow for one feed: normalize, sort, upsert, probe, emit.
use std::collections::HashSet;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::app::control::{CoreEvent, ErrorEvent};
use crate::domain::canonical::canonicalize;
use crate::domain::error::{ErrorKind, WorkerError};
use crate::domain::model::{FeedConfig, FeedItem, NewItem};
use crate::feed::source::FeedSource;
use crate::ports::clock::Clock;
use crate::ports::http::Http;
use crate::ports::repo::Repo;

/// Summary of one completed tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickOutcome {
    pub fetched: usize,
    pub published: usize,
    /// Whether the cycle got as far as the store; failure state is only
    /// cleared for cycles that did.
    pub reached_store: bool,
}

pub async fn run_tick<R, H, C>(
    repo: &R,
    http: &H,
    clock: &C,
    events: &UnboundedSender<CoreEvent>,
    config: &FeedConfig,
) -> Result<TickOutcome, WorkerError>
where
    R: Repo,
    H: Http,
    C: Clock,
{
    // Lower bound for the post-insert probe; recorded before any write.
    let started_at = clock.now().await;

    let fetched = FeedSource::new(config, http).fetch(started_at).await?;
    let fetched_count = fetched.len();

    let mut items: Vec<FeedItem> = fetched
        .into_iter()
        .filter_map(|mut item| {
            let canonical = canonicalize(&item.url)?;
            item.url = canonical;
            Some(item)
        })
        .collect();

    // Ascending publication date; undated items sort last.
    items.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    // One row per canonical url; the earliest dated occurrence wins.
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.url.clone()));

    if items.is_empty() {
        return Ok(TickOutcome {
            fetched: fetched_count,
            published: 0,
            reached_store: false,
        });
    }

    let rows: Vec<NewItem> = items
        .iter()
        .map(|item| NewItem {
            title: item.title.clone(),
            url: item.url.clone(),
            category: item.category,
            website: item.website,
            date: item.date.unwrap_or(started_at),
        })
        .collect();

    repo.bulk_upsert_items(&rows)
        .await
        .map_err(|e| WorkerError::for_feed(ErrorKind::Db, e, &config.url, config.id))?;

    let urls: Vec<String> = rows.iter().map(|row| row.url.clone()).collect();
    let new_urls: HashSet<String> = repo
        .find_inserted_since(config.id, &urls, started_at)
        .await
        .map_err(|e| WorkerError::for_feed(ErrorKind::Db, e, &config.url, config.id))?
        .into_iter()
        .collect();

    let mut published = 0usize;
    for item in items.iter().filter(|item| new_urls.contains(&item.url)) {
        match repo.get_item(config.id, &item.url).await {
            Ok(Some(persisted)) => {
                if events.send(CoreEvent::NewItem(persisted)).is_err() {
                    warn!(url = %item.url, "Event bus closed, dropping new item");
                } else {
                    published += 1;
                }
            }
            Ok(None) => {
                let _ = events.send(CoreEvent::Error(ErrorEvent {
                    kind: ErrorKind::ItemSave,
                    message: format!("inserted item vanished: {}", item.url),
                    feed_url: Some(config.url.clone()),
                    feed_id: Some(config.id),
                }));
            }
            Err(e) => {
                let _ = events.send(CoreEvent::Error(ErrorEvent {
                    kind: ErrorKind::ItemSave,
                    message: format!("failed to load inserted item {}: {e}", item.url),
                    feed_url: Some(config.url.clone()),
                    feed_id: Some(config.id),
                }));
            }
        }
    }

    debug!(
        url = %config.url,
        fetched = fetched_count,
        new = published,
        "Tick pipeline complete"
    );
    Ok(TickOutcome {
        fetched: fetched_count,
        published,
        reached_store: true,
    })
}
