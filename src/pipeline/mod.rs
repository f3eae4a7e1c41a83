// ============================================================================
// Command Commit Pipeline
// ============================================================================
//
// Two phases joined by one gate:
//   1. transactional: event first, then table -> seats -> hand ->
//      hand players -> wallet, then commit;
//   2. notification: publish the committed event, once.
// Phase 2 runs only if phase 1 committed.
//
// ============================================================================

pub mod gateway;
pub mod orchestrator;

pub use gateway::{CommandGateway, SubmitOutcome};
pub use orchestrator::{CommandPipeline, CommitReceipt, apply_batch};
