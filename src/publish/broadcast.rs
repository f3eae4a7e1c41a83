use super::EventPublisher;
use crate::config::PipelineConfig;
use crate::core::{PublishError, TableId};
use crate::model::EventRecord;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{Level, event};

/// Fan-out over a `tokio::sync::broadcast` channel.
///
/// Slow receivers lag and lose events; delivery is best-effort. Publishing
/// with no subscribers succeeds.
#[derive(Debug)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<Arc<EventRecord>>,
    closed: AtomicBool,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.publish_channel_capacity)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventRecord>> {
        self.sender.subscribe()
    }

    /// Receiver that only yields events of `table_id`.
    pub fn subscribe_table(&self, table_id: impl Into<TableId>) -> TableSubscription {
        TableSubscription {
            table_id: table_id.into(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Refuses every later publish.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, record: &EventRecord) -> Result<(), PublishError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PublishError::ChannelClosed);
        }

        match self.sender.send(Arc::new(record.clone())) {
            Ok(receivers) => {
                event!(Level::DEBUG, event_id = %record.event_id, receivers, "event broadcast");
            }
            Err(_) => {
                event!(Level::DEBUG, event_id = %record.event_id, "event broadcast without subscribers");
            }
        }
        Ok(())
    }
}

pub struct TableSubscription {
    table_id: TableId,
    receiver: broadcast::Receiver<Arc<EventRecord>>,
}

impl TableSubscription {
    pub fn table_id(&self) -> &TableId {
        &self.table_id
    }

    /// Next event for this table. Lagged gaps are skipped; `None` once the
    /// publisher is gone.
    pub async fn recv(&mut self) -> Option<Arc<EventRecord>> {
        loop {
            match self.receiver.recv().await {
                Ok(record) if record.table_id == self.table_id => return Some(record),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    event!(Level::WARN, table_id = %self.table_id, skipped, "subscription lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
