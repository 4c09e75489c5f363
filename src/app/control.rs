//! Control plane: inbound command subscription and outbound event routing.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::app::scheduler::Scheduler;
use crate::domain::error::{ErrorKind, NewErrorRecord, WorkerError};
use crate::domain::model::{FeedDraft, PersistedItem};
use crate::ports::bus::{Publisher, Subscriber};
use crate::ports::clock::Clock;
use crate::ports::http::Http;
use crate::ports::repo::Repo;

pub const COMMAND_CHANNEL: &str = "aggregator";
pub const ERROR_CHANNEL: &str = "aggregator-errors";
pub const STATUS_CHANNEL: &str = "aggregator-status";

/// Channel carrying new items for one category.
pub fn item_channel(category: i32) -> String {
    format!("feed:wire:{category}")
}

/// The closed outbound event taxonomy.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    NewItem(PersistedItem),
    Error(ErrorEvent),
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
    pub feed_url: Option<String>,
    pub feed_id: Option<i32>,
}

impl From<WorkerError> for ErrorEvent {
    fn from(err: WorkerError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
            feed_url: err.feed_url,
            feed_id: err.feed_id,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
enum Command {
    Add(FeedDraft),
    Remove { url: String },
    Replace(FeedDraft),
}

#[derive(Debug, Serialize)]
struct ItemEnvelope<'a> {
    event: &'a str,
    data: &'a PersistedItem,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    message: &'a str,
    feed: Option<&'a str>,
    #[serde(rename = "feedId")]
    feed_id: Option<i32>,
}

/// Consumes the inbound command channel until the subscription closes.
pub async fn run_command_loop<S, R, H, C>(
    subscriber: &S,
    scheduler: Scheduler<R, H, C>,
) -> Result<(), String>
where
    S: Subscriber,
    R: Repo + 'static,
    H: Http + 'static,
    C: Clock + 'static,
{
    let mut rx = subscriber.subscribe(COMMAND_CHANNEL).await?;
    info!(channel = COMMAND_CHANNEL, "Subscribed to command channel");
    while let Some(message) = rx.recv().await {
        dispatch_command(&scheduler, &message.payload).await;
    }
    Ok(())
}

/// Parses one command payload and applies it to the scheduler. Malformed
/// JSON and unknown commands are logged and dropped.
pub async fn dispatch_command<R, H, C>(scheduler: &Scheduler<R, H, C>, payload: &str)
where
    R: Repo + 'static,
    H: Http + 'static,
    C: Clock + 'static,
{
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Dropping malformed command");
            return;
        }
    };
    let cmd = value
        .get("cmd")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();
    match serde_json::from_value::<Command>(value) {
        Ok(Command::Add(draft)) => scheduler.add(draft).await,
        Ok(Command::Remove { url }) => scheduler.remove(&url).await,
        Ok(Command::Replace(draft)) => scheduler.replace(draft).await,
        Err(e) => {
            if matches!(cmd.as_str(), "add" | "remove" | "replace") {
                warn!(cmd = %cmd, error = %e, "Dropping command with invalid payload");
            } else {
                warn!(cmd = %cmd, "Unknown command");
            }
        }
    }
}

/// Drains the core event bus: publishes new items on their category channel,
/// records and publishes errors, and raises `shutdown` on critical kinds.
pub async fn run_event_loop<P, R>(
    mut events: UnboundedReceiver<CoreEvent>,
    publisher: Arc<P>,
    repo: Arc<R>,
    shutdown: Arc<Notify>,
) where
    P: Publisher,
    R: Repo,
{
    while let Some(event) = events.recv().await {
        match event {
            CoreEvent::NewItem(item) => {
                if let Err(e) = publish_item(publisher.as_ref(), &item).await {
                    // Publish failures are transport failures; critical.
                    let event = ErrorEvent {
                        kind: ErrorKind::Redis,
                        message: format!("failed to publish item {}: {e}", item.url),
                        feed_url: None,
                        feed_id: Some(item.website),
                    };
                    route_error(publisher.as_ref(), repo.as_ref(), &event, &shutdown).await;
                }
            }
            CoreEvent::Error(err) => {
                route_error(publisher.as_ref(), repo.as_ref(), &err, &shutdown).await
            }
        }
    }
}

async fn publish_item<P: Publisher>(publisher: &P, item: &PersistedItem) -> Result<(), String> {
    let channel = item_channel(item.category);
    let envelope = ItemEnvelope {
        event: &channel,
        data: item,
    };
    let payload =
        serde_json::to_string(&envelope).map_err(|e| format!("item envelope encode: {e}"))?;
    publisher.publish(&channel, &payload).await
}

async fn route_error<P: Publisher, R: Repo>(
    publisher: &P,
    repo: &R,
    event: &ErrorEvent,
    shutdown: &Notify,
) {
    error!(
        kind = event.kind.tag(),
        feed = event.feed_url.as_deref().unwrap_or("-"),
        message = %event.message,
        "Core error"
    );

    repo.log_error(&NewErrorRecord {
        kind: event.kind,
        feed_id: event.feed_id,
        message: event.message.clone(),
    })
    .await;

    let envelope = ErrorEnvelope {
        kind: event.kind.tag(),
        message: &event.message,
        feed: event.feed_url.as_deref(),
        feed_id: event.feed_id,
    };
    match serde_json::to_string(&envelope) {
        Ok(payload) => {
            if let Err(e) = publisher.publish(ERROR_CHANNEL, &payload).await {
                warn!(error = %e, "Failed to publish error envelope");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode error envelope"),
    }

    if event.kind.is_critical() {
        warn!(kind = event.kind.tag(), "Critical error, requesting shutdown");
        shutdown.notify_one();
    }
}

/// Shutdown notice published on the status channel before exit.
pub async fn publish_shutdown<P: Publisher>(publisher: &P) {
    let payload = serde_json::json!({ "event": "shutdown" }).to_string();
    if let Err(e) = publisher.publish(STATUS_CHANNEL, &payload).await {
        warn!(error = %e, "Failed to publish shutdown notice");
    }
}
