//! Shared in-memory port implementations and feed fixtures.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use feedwire::app::control::CoreEvent;
use feedwire::app::scheduler::Scheduler;
use feedwire::domain::error::NewErrorRecord;
use feedwire::domain::model::{FeedConfig, FeedDraft, NewItem, PersistedItem};
use feedwire::infra::config::{PostgresConfig, WorkerConfig};
use feedwire::infra::system_clock::SystemClock;
use feedwire::ports::http::{FetchResponse, Http};
use feedwire::ports::repo::Repo;

#[derive(Default)]
struct RepoState {
    feeds: Vec<FeedConfig>,
    next_feed_id: i32,
    items: Vec<StoredItem>,
    next_item_id: i64,
    errors: Vec<NewErrorRecord>,
}

struct StoredItem {
    item: PersistedItem,
    created_at: DateTime<Utc>,
}

/// In-memory store honoring the `(website, url)` unique constraint.
#[derive(Default)]
pub struct MemoryRepo {
    state: Mutex<RepoState>,
    pub fail_get_all: AtomicBool,
    pub fail_bulk_upsert: AtomicBool,
    pub fail_get_item: AtomicBool,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_feed(&self, config: FeedConfig) {
        let mut state = self.state.lock().unwrap();
        state.next_feed_id = state.next_feed_id.max(config.id);
        state.feeds.push(config);
    }

    pub fn feed_count(&self) -> usize {
        self.state.lock().unwrap().feeds.len()
    }

    pub fn stored_feed(&self, url: &str) -> Option<FeedConfig> {
        self.state
            .lock()
            .unwrap()
            .feeds
            .iter()
            .find(|f| f.url == url)
            .cloned()
    }

    pub fn item_count(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn item_urls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .items
            .iter()
            .map(|stored| stored.item.url.clone())
            .collect()
    }

    pub fn error_tags(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .errors
            .iter()
            .map(|record| record.kind.tag())
            .collect()
    }
}

#[async_trait::async_trait]
impl Repo for MemoryRepo {
    async fn get_all_feeds(&self) -> Result<Vec<FeedConfig>, String> {
        if self.fail_get_all.load(Ordering::SeqCst) {
            return Err("injected load failure".to_string());
        }
        Ok(self.state.lock().unwrap().feeds.clone())
    }

    async fn get_feed_by_url(&self, url: &str) -> Result<Option<FeedConfig>, String> {
        Ok(self.stored_feed(url))
    }

    async fn insert_feed(&self, draft: &FeedDraft) -> Result<FeedConfig, String> {
        let mut state = self.state.lock().unwrap();
        if state.feeds.iter().any(|f| f.url == draft.url) {
            return Err(format!("duplicate feed url {}", draft.url));
        }
        state.next_feed_id += 1;
        let config = FeedConfig {
            id: state.next_feed_id,
            name: draft.name.clone(),
            url: draft.url.clone(),
            category: draft.category,
            refresh_ms: draft.refresh_ms,
            created_at: Utc::now(),
        };
        state.feeds.push(config.clone());
        Ok(config)
    }

    async fn update_feed(&self, config: &FeedConfig) -> Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if let Some(found) = state.feeds.iter_mut().find(|f| f.url == config.url) {
            found.name = config.name.clone();
            found.category = config.category;
            found.refresh_ms = config.refresh_ms;
        }
        Ok(())
    }

    async fn remove_feed_by_url(&self, url: &str) -> Result<u64, String> {
        let mut state = self.state.lock().unwrap();
        let before = state.feeds.len();
        state.feeds.retain(|f| f.url != url);
        Ok((before - state.feeds.len()) as u64)
    }

    async fn bulk_upsert_items(&self, rows: &[NewItem]) -> Result<(), String> {
        if self.fail_bulk_upsert.load(Ordering::SeqCst) {
            return Err("injected upsert failure".to_string());
        }
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        for row in rows {
            let duplicate = state
                .items
                .iter()
                .any(|stored| stored.item.website == row.website && stored.item.url == row.url);
            if duplicate {
                continue;
            }
            state.next_item_id += 1;
            let id = state.next_item_id;
            state.items.push(StoredItem {
                item: PersistedItem {
                    id,
                    title: row.title.clone(),
                    url: row.url.clone(),
                    category: row.category,
                    website: row.website,
                    date: row.date,
                },
                created_at: now,
            });
        }
        Ok(())
    }

    async fn find_inserted_since(
        &self,
        website: i32,
        urls: &[String],
        since: DateTime<Utc>,
    ) -> Result<Vec<String>, String> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .items
            .iter()
            .filter(|stored| {
                stored.item.website == website
                    && urls.contains(&stored.item.url)
                    && stored.created_at >= since
            })
            .map(|stored| stored.item.url.clone())
            .collect())
    }

    async fn get_item(&self, website: i32, url: &str) -> Result<Option<PersistedItem>, String> {
        if self.fail_get_item.load(Ordering::SeqCst) {
            return Err("injected item load failure".to_string());
        }
        Ok(self
            .state
            .lock()
            .unwrap()
            .items
            .iter()
            .find(|stored| stored.item.website == website && stored.item.url == url)
            .map(|stored| stored.item.clone()))
    }

    async fn log_error(&self, record: &NewErrorRecord) {
        self.state.lock().unwrap().errors.push(record.clone());
    }
}

#[derive(Default)]
struct StubState {
    queued: HashMap<String, VecDeque<FetchResponse>>,
    defaults: HashMap<String, FetchResponse>,
}

/// Scripted HTTP responses keyed by url; unknown urls answer 404.
#[derive(Default)]
pub struct StubHttp {
    state: Mutex<StubState>,
}

impl StubHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, url: &str, response: FetchResponse) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn push_ok(&self, url: &str, body: &str) {
        self.push(url, ok_response(body));
    }

    pub fn push_status(&self, url: &str, status: u16) {
        self.push(url, status_response(status));
    }

    /// Response returned once the queue for `url` is drained.
    pub fn set_default(&self, url: &str, response: FetchResponse) {
        self.state
            .lock()
            .unwrap()
            .defaults
            .insert(url.to_string(), response);
    }
}

#[async_trait::async_trait]
impl Http for StubHttp {
    async fn get(&self, url: &str) -> FetchResponse {
        let mut state = self.state.lock().unwrap();
        if let Some(response) = state.queued.get_mut(url).and_then(|q| q.pop_front()) {
            return response;
        }
        state
            .defaults
            .get(url)
            .cloned()
            .unwrap_or_else(|| status_response(404))
    }
}

pub fn ok_response(body: &str) -> FetchResponse {
    FetchResponse {
        status: Some(200),
        body: Some(body.as_bytes().to_vec()),
        error: None,
        latency_ms: 1,
    }
}

pub fn status_response(status: u16) -> FetchResponse {
    FetchResponse {
        status: Some(status),
        body: Some(Vec::new()),
        error: None,
        latency_ms: 1,
    }
}

pub fn rss(items: &[(&str, &str, DateTime<Utc>)]) -> String {
    let mut entries = String::new();
    for (title, link, date) in items {
        entries.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><pubDate>{}</pubDate></item>",
            date.to_rfc2822()
        ));
    }
    format!(
        "<?xml version=\"1.0\"?><rss version=\"2.0\"><channel>\
         <title>Fixture</title><link>https://fixture.test</link>\
         <description>fixture</description>{entries}</channel></rss>"
    )
}

pub fn feed_config(id: i32, url: &str, category: i32, refresh_ms: i64) -> FeedConfig {
    FeedConfig {
        id,
        name: format!("feed-{id}"),
        url: url.to_string(),
        category,
        refresh_ms,
        created_at: Utc::now(),
    }
}

pub fn feed_draft(url: &str, category: i32, refresh_ms: i64) -> FeedDraft {
    FeedDraft {
        name: "draft".to_string(),
        url: url.to_string(),
        category,
        refresh_ms,
    }
}

pub fn test_config() -> WorkerConfig {
    WorkerConfig {
        postgres: PostgresConfig {
            user: "admin".to_string(),
            password: "admin".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            database: "feedwire_test".to_string(),
        },
        user_agent: "feedwire-test/0".to_string(),
        fetch_timeout_seconds: 1,
        log_level: "warn".to_string(),
        seeds: Vec::new(),
    }
}

pub struct TestWorker {
    pub repo: Arc<MemoryRepo>,
    pub http: Arc<StubHttp>,
    pub scheduler: Scheduler<MemoryRepo, StubHttp, SystemClock>,
    pub events: UnboundedReceiver<CoreEvent>,
}

pub fn worker() -> TestWorker {
    let repo = Arc::new(MemoryRepo::new());
    let http = Arc::new(StubHttp::new());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(
        Arc::new(test_config()),
        repo.clone(),
        http.clone(),
        Arc::new(SystemClock),
        events_tx,
    );
    TestWorker {
        repo,
        http,
        scheduler,
        events: events_rx,
    }
}

pub fn event_channel() -> (UnboundedSender<CoreEvent>, UnboundedReceiver<CoreEvent>) {
    mpsc::unbounded_channel()
}

/// Waits for the next core event; under paused time the timeout only elapses
/// when nothing is left to run.
pub async fn next_event(events: &mut UnboundedReceiver<CoreEvent>) -> CoreEvent {
    tokio::time::timeout(Duration::from_secs(86_400), events.recv())
        .await
        .expect("timed out waiting for core event")
        .expect("event channel closed")
}

/// Lets already-runnable tasks finish their current work without advancing
/// the (possibly paused) clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
