//! In-process pub/sub fan-out behind the `Publisher`/`Subscriber` ports.
//! A networked transport plugs in behind the same traits.
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;

use crate::ports::bus::{BusMessage, Publisher, Subscriber};

#[derive(Clone, Default)]
pub struct MemoryBus {
    channels: Arc<RwLock<HashMap<String, Vec<UnboundedSender<BusMessage>>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Publisher for MemoryBus {
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), String> {
        let mut channels = self.channels.write().await;
        if let Some(subscribers) = channels.get_mut(channel) {
            // Dropped receivers are pruned on the way through.
            subscribers.retain(|tx| {
                tx.send(BusMessage {
                    channel: channel.to_string(),
                    payload: payload.to_string(),
                })
                .is_ok()
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Subscriber for MemoryBus {
    async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<BusMessage>, String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels
            .write()
            .await
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}
