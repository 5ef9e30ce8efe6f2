//! Downstream notification sink.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// Receives one named notification per successfully handled event.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, name: &str, payload: Value);
}

/// Writes notifications to the log instead of a bus.
#[derive(Debug, Default, Clone)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, name: &str, payload: Value) {
        info!(notification = name, %payload, "published");
    }
}
