use super::{CommandPipeline, CommitReceipt};
use crate::config::PipelineConfig;
use crate::core::{CommitError, SubmitError, Timestamp};
use crate::idempotency::{Clock, IdempotencyCache, IdempotencyScope};
use crate::model::CommandBatch;
use crate::publish::EventPublisher;
use crate::transaction::TransactionBoundary;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, event};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Request id already accepted inside the idempotency window. Nothing ran.
    Duplicate,
    Committed(CommitReceipt),
}

impl SubmitOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate)
    }

    pub fn receipt(&self) -> Option<&CommitReceipt> {
        match self {
            Self::Committed(receipt) => Some(receipt),
            Self::Duplicate => None,
        }
    }
}

/// Command intake: idempotency classification in front of the pipeline.
///
/// Entry handling per outcome:
/// - not committed: this attempt's entry released, a retry with the same
///   request id runs again (a newer admission of the same id is kept);
/// - committed (publish ok or not): entry kept;
/// - timed out: entry kept, outcome unknown.
pub struct CommandGateway<B, P> {
    cache: Arc<IdempotencyCache>,
    pipeline: CommandPipeline<B, P>,
    clock: Arc<dyn Clock>,
    commit_timeout: Option<Duration>,
}

impl<B, P> CommandGateway<B, P>
where
    B: TransactionBoundary,
    P: EventPublisher,
{
    pub fn new(
        cache: Arc<IdempotencyCache>,
        pipeline: CommandPipeline<B, P>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            pipeline,
            clock,
            commit_timeout: None,
        }
    }

    pub fn from_config(
        config: &PipelineConfig,
        pipeline: CommandPipeline<B, P>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = Arc::new(IdempotencyCache::new(config.idempotency_ttl_duration()));
        let mut gateway = Self::new(cache, pipeline, clock);
        gateway.commit_timeout = config.commit_timeout_duration();
        gateway
    }

    pub fn with_commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = Some(timeout);
        self
    }

    pub fn cache(&self) -> &Arc<IdempotencyCache> {
        &self.cache
    }

    pub fn pipeline(&self) -> &CommandPipeline<B, P> {
        &self.pipeline
    }

    /// Classifies and, when novel, commits and publishes `batch` using the
    /// gateway's clock.
    pub async fn submit(
        &self,
        scope: &IdempotencyScope,
        request_id: &str,
        batch: CommandBatch,
    ) -> Result<SubmitOutcome, SubmitError> {
        let now = self.clock.now();
        self.submit_at(scope, request_id, now, batch).await
    }

    /// Same as [`submit`](Self::submit) with a caller-supplied `now`.
    pub async fn submit_at(
        &self,
        scope: &IdempotencyScope,
        request_id: &str,
        now: Timestamp,
        batch: CommandBatch,
    ) -> Result<SubmitOutcome, SubmitError> {
        let Some(ticket) = self.cache.admit(scope, request_id, now) else {
            event!(
                Level::INFO,
                actor_id = %scope.actor_id,
                request_id,
                "duplicate command skipped"
            );
            return Ok(SubmitOutcome::Duplicate);
        };

        let commit = self.pipeline.commit_and_publish(batch);
        let result = match self.commit_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, commit).await {
                Ok(result) => result,
                Err(_) => {
                    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    event!(
                        Level::ERROR,
                        actor_id = %scope.actor_id,
                        request_id,
                        timeout_ms,
                        "commit outcome unresolved"
                    );
                    return Err(SubmitError::Unresolved { timeout_ms });
                }
            },
            None => commit.await,
        };

        match result {
            Ok(receipt) => Ok(SubmitOutcome::Committed(receipt)),
            Err(CommitError::NotCommitted(err)) => {
                let released = self.cache.release(scope, request_id, &ticket);
                event!(
                    Level::DEBUG,
                    actor_id = %scope.actor_id,
                    request_id,
                    released,
                    "idempotency entry released after failed commit"
                );
                Err(CommitError::NotCommitted(err).into())
            }
            Err(err) => Err(err.into()),
        }
    }
}
