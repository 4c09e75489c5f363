//! Owns the set of live feeds: per-feed timer tasks, dynamic
//! add/remove/replace, backoff on transient failures, and lifecycle.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::control::{CoreEvent, ErrorEvent};
use crate::app::pipeline;
use crate::domain::backoff::{backoff_interval_ms, FailureState, MAX_CONSECUTIVE_FAILURES};
use crate::domain::error::ErrorKind;
use crate::domain::model::{FeedConfig, FeedDraft};
use crate::infra::config::WorkerConfig;
use crate::ports::clock::Clock;
use crate::ports::http::Http;
use crate::ports::repo::Repo;

struct ActiveFeed {
    config: FeedConfig,
    last_error: Option<String>,
    wake: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

pub struct Scheduler<R, H, C> {
    cfg: Arc<WorkerConfig>,
    repo: Arc<R>,
    http: Arc<H>,
    clock: Arc<C>,
    events: UnboundedSender<CoreEvent>,
    feeds: Arc<RwLock<HashMap<String, ActiveFeed>>>,
    failures: Arc<Mutex<HashMap<i32, FailureState>>>,
}

impl<R, H, C> Clone for Scheduler<R, H, C> {
    fn clone(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
            repo: self.repo.clone(),
            http: self.http.clone(),
            clock: self.clock.clone(),
            events: self.events.clone(),
            feeds: self.feeds.clone(),
            failures: self.failures.clone(),
        }
    }
}

impl<R, H, C> Scheduler<R, H, C>
where
    R: Repo + 'static,
    H: Http + 'static,
    C: Clock + 'static,
{
    pub fn new(
        cfg: Arc<WorkerConfig>,
        repo: Arc<R>,
        http: Arc<H>,
        clock: Arc<C>,
        events: UnboundedSender<CoreEvent>,
    ) -> Self {
        Self {
            cfg,
            repo,
            http,
            clock,
            events,
            feeds: Arc::new(RwLock::new(HashMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Loads every stored config and starts its timer; returns the count
    /// started. A store failure surfaces as a `db_error` event and starts
    /// nothing.
    pub async fn init(&self) -> usize {
        let configs = match self.repo.get_all_feeds().await {
            Ok(configs) => configs,
            Err(e) => {
                self.emit_error(ErrorKind::Db, format!("failed to load feeds: {e}"), None, None);
                return 0;
            }
        };
        let count = configs.len();
        for config in configs {
            self.start_feed(config).await;
        }
        info!(feeds = count, "Scheduler initialized");
        count
    }

    /// Validates and upserts a config keyed by url, then (re)starts its
    /// timer. Invalid configs surface as `type_error` and are skipped.
    pub async fn add(&self, draft: FeedDraft) {
        if let Err(message) = draft.validate(self.cfg.min_refresh_ms()) {
            self.emit_error(ErrorKind::Type, message, Some(draft.url.clone()), None);
            return;
        }
        let config = match self.upsert(&draft).await {
            Ok(config) => config,
            Err(e) => {
                self.emit_error(
                    ErrorKind::Db,
                    format!("failed to save feed: {e}"),
                    Some(draft.url.clone()),
                    None,
                );
                return;
            }
        };
        info!(url = %config.url, refresh_ms = config.refresh_ms, "Feed added");
        self.start_feed(config).await;
    }

    async fn upsert(&self, draft: &FeedDraft) -> Result<FeedConfig, String> {
        match self.repo.get_feed_by_url(&draft.url).await? {
            Some(existing) => {
                let updated = FeedConfig {
                    id: existing.id,
                    name: draft.name.clone(),
                    url: draft.url.clone(),
                    category: draft.category,
                    refresh_ms: draft.refresh_ms,
                    created_at: existing.created_at,
                };
                self.repo.update_feed(&updated).await?;
                Ok(updated)
            }
            None => self.repo.insert_feed(draft).await,
        }
    }

    /// Cancels the feed's timer, clears its runtime entry, and deletes its
    /// store row. Removing an unknown url still attempts the store delete.
    pub async fn remove(&self, url: &str) {
        let entry = self.feeds.write().await.remove(url);
        if let Some(entry) = &entry {
            self.failures.lock().await.remove(&entry.config.id);
        }
        match self.repo.remove_feed_by_url(url).await {
            Ok(rows) => debug!(url, rows, "Feed removed"),
            Err(e) => self.emit_error(
                ErrorKind::Db,
                format!("failed to delete feed: {e}"),
                Some(url.to_string()),
                None,
            ),
        }
        // Abort last: a feed task removing itself must finish the store
        // delete before its own cancellation point.
        if let Some(entry) = entry {
            if let Some(handle) = entry.handle {
                handle.abort();
            }
        }
    }

    /// Tears down the runtime entry, then re-adds. The url-keyed upsert
    /// updates the store row in place, preserving its id.
    pub async fn replace(&self, draft: FeedDraft) {
        if let Some(entry) = self.feeds.write().await.remove(&draft.url) {
            self.failures.lock().await.remove(&entry.config.id);
            if let Some(handle) = entry.handle {
                handle.abort();
            }
        }
        self.add(draft).await;
    }

    /// Persists the new refresh and restarts the feed's timer with it.
    pub async fn update_interval(&self, url: &str, refresh_ms: i64) {
        let (config, wake) = {
            let mut feeds = self.feeds.write().await;
            let Some(entry) = feeds.get_mut(url) else {
                return;
            };
            entry.config.refresh_ms = refresh_ms;
            (entry.config.clone(), entry.wake.clone())
        };
        if let Err(e) = self.repo.update_feed(&config).await {
            self.emit_error(
                ErrorKind::Db,
                format!("failed to persist refresh: {e}"),
                Some(url.to_string()),
                Some(config.id),
            );
        }
        wake.notify_one();
    }

    /// Stops all timers, clears runtime state, then reloads from the store.
    pub async fn reload_feeds(&self) -> usize {
        self.destroy().await;
        self.init().await
    }

    /// Cancels every timer and clears all runtime state.
    pub async fn destroy(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut feeds = self.feeds.write().await;
            feeds
                .drain()
                .filter_map(|(_, entry)| {
                    entry.handle.map(|handle| {
                        handle.abort();
                        handle
                    })
                })
                .collect()
        };
        self.failures.lock().await.clear();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                if e.is_panic() {
                    self.emit_error(
                        ErrorKind::Internal,
                        format!("feed task panicked: {e}"),
                        None,
                        None,
                    );
                }
            }
        }
        info!("Scheduler destroyed");
    }

    /// The runtime view of a feed, including the currently applied refresh.
    pub async fn get_feed_config(&self, url: &str) -> Option<FeedConfig> {
        self.feeds
            .read()
            .await
            .get(url)
            .map(|entry| entry.config.clone())
    }

    /// Current consecutive failure count for a feed, if it is tracked.
    pub async fn consecutive_failures(&self, feed_id: i32) -> Option<u32> {
        self.failures
            .lock()
            .await
            .get(&feed_id)
            .map(|state| state.consecutive_failures)
    }

    async fn start_feed(&self, config: FeedConfig) {
        let url = config.url.clone();
        let mut feeds = self.feeds.write().await;
        if let Some(old) = feeds.remove(&url) {
            if let Some(handle) = old.handle {
                handle.abort();
            }
        }
        let wake = Arc::new(Notify::new());
        let handle = tokio::spawn(feed_loop(self.clone(), url.clone()));
        feeds.insert(
            url,
            ActiveFeed {
                config,
                last_error: None,
                wake,
                handle: Some(handle),
            },
        );
    }

    async fn timer_params(&self, url: &str) -> Option<(i64, Arc<Notify>)> {
        self.feeds
            .read()
            .await
            .get(url)
            .map(|entry| (entry.config.refresh_ms, entry.wake.clone()))
    }

    async fn run_feed_tick(&self, config: &FeedConfig) {
        let started = Instant::now();
        let result = pipeline::run_tick(
            self.repo.as_ref(),
            self.http.as_ref(),
            self.clock.as_ref(),
            &self.events,
            config,
        )
        .await;

        match result {
            Ok(outcome) => {
                if outcome.reached_store {
                    self.failures.lock().await.remove(&config.id);
                }
                if let Some(entry) = self.feeds.write().await.get_mut(&config.url) {
                    entry.last_error = None;
                }
                debug!(
                    url = %config.url,
                    fetched = outcome.fetched,
                    published = outcome.published,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Feed tick complete"
                );
            }
            Err(err) => {
                warn!(url = %config.url, kind = err.kind.tag(), error = %err.message, "Feed tick failed");
                if let Some(entry) = self.feeds.write().await.get_mut(&config.url) {
                    entry.last_error = Some(err.message.clone());
                }
                let transient = matches!(err.kind, ErrorKind::FetchUrl | ErrorKind::ParseUrl);
                let _ = self.events.send(CoreEvent::Error(err.into()));
                if transient {
                    self.register_failure(config).await;
                }
            }
        }
    }

    /// Backoff bookkeeping for one transient failure; removes the feed for
    /// good once the threshold is reached.
    async fn register_failure(&self, config: &FeedConfig) {
        let state = {
            let mut failures = self.failures.lock().await;
            let (count, original) = {
                let entry = failures.entry(config.id).or_insert(FailureState {
                    consecutive_failures: 0,
                    original_refresh_ms: config.refresh_ms,
                });
                entry.consecutive_failures += 1;
                (entry.consecutive_failures, entry.original_refresh_ms)
            };
            if count >= MAX_CONSECUTIVE_FAILURES {
                failures.remove(&config.id);
                None
            } else {
                Some(FailureState {
                    consecutive_failures: count,
                    original_refresh_ms: original,
                })
            }
        };

        match state {
            Some(state) => {
                let next = backoff_interval_ms(state.original_refresh_ms, state.consecutive_failures);
                info!(
                    url = %config.url,
                    failures = state.consecutive_failures,
                    next_refresh_ms = next,
                    "Backing off feed"
                );
                self.update_interval(&config.url, next).await;
            }
            None => {
                warn!(url = %config.url, "Feed exceeded failure threshold, removing");
                let last_error = self
                    .feeds
                    .read()
                    .await
                    .get(&config.url)
                    .and_then(|entry| entry.last_error.clone());
                let message = match last_error {
                    Some(last) => format!(
                        "removed after {MAX_CONSECUTIVE_FAILURES} consecutive failures, last: {last}"
                    ),
                    None => {
                        format!("removed after {MAX_CONSECUTIVE_FAILURES} consecutive failures")
                    }
                };
                self.emit_error(
                    ErrorKind::PermanentFailure,
                    message,
                    Some(config.url.clone()),
                    Some(config.id),
                );
                self.remove(&config.url).await;
            }
        }
    }

    fn emit_error(
        &self,
        kind: ErrorKind,
        message: String,
        feed_url: Option<String>,
        feed_id: Option<i32>,
    ) {
        let _ = self.events.send(CoreEvent::Error(ErrorEvent {
            kind,
            message,
            feed_url,
            feed_id,
        }));
    }
}

/// One cooperative task per feed: immediate first tick, then timer-driven
/// ticks that never overlap. A wake on the entry's `Notify` restarts the
/// timer with the currently applied refresh; a missing runtime entry ends
/// the task.
async fn feed_loop<R, H, C>(scheduler: Scheduler<R, H, C>, url: String)
where
    R: Repo + 'static,
    H: Http + 'static,
    C: Clock + 'static,
{
    let mut first_tick = true;
    loop {
        if !first_tick {
            let Some((refresh_ms, wake)) = scheduler.timer_params(&url).await else {
                return;
            };
            let period = Duration::from_millis(refresh_ms.max(0) as u64);
            tokio::select! {
                _ = tokio::time::sleep(period) => {}
                _ = wake.notified() => continue,
            }
        }
        first_tick = false;
        let Some(config) = scheduler.get_feed_config(&url).await else {
            return;
        };
        scheduler.run_feed_tick(&config).await;
    }
}
