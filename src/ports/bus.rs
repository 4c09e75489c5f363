//! Contract over the messaging transport: fire-and-forget publish plus
//! persistent channel subscriptions.
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Clone)]
pub struct BusMessage {
    pub channel: String,
    pub payload: String,
}

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Best-effort; delivery is not acknowledged.
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), String>;
}

#[async_trait::async_trait]
pub trait Subscriber: Send + Sync {
    /// Opens a persistent subscription; the receiver yields every message
    /// published on `channel` from this point on.
    async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<BusMessage>, String>;
}
