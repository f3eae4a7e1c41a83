// ============================================================================
// Event Publishing
// ============================================================================
//
// Notification side of the pipeline. Only ever handed events that are
// already committed.
//
// ============================================================================

pub mod broadcast;

pub use broadcast::{BroadcastPublisher, TableSubscription};

use crate::core::PublishError;
use crate::model::EventRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Delivers a committed event to observers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &EventRecord) -> Result<(), PublishError>;
}

#[async_trait]
impl<P: EventPublisher + ?Sized> EventPublisher for Arc<P> {
    async fn publish(&self, event: &EventRecord) -> Result<(), PublishError> {
        (**self).publish(event).await
    }
}
