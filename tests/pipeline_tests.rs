mod pipeline_support;

use pipeline_support::*;
use std::sync::Arc;
use tablecommit::model::{HandStatus, LedgerReason, SeatStatus, Street, TableStatus};
use tablecommit::{
    ActorId, CommandBatch, CommandPipeline, CommitError, HandId, HandMutation, HandPlayerUpsert,
    InvariantViolation, PublishError, SeatMutation, StoreError, TableId, TableMutation,
    TxOperation, WalletTransaction,
};

struct Harness {
    store: tablecommit::InMemoryGameStore,
    log: StepLog,
    publisher: Arc<RecordingPublisher>,
    pipeline: CommandPipeline<RecordingBoundary, RecordingPublisher>,
}

async fn harness() -> Harness {
    init_tracing();
    let store = seeded_store().await;
    let log = StepLog::default();
    let boundary = Arc::new(RecordingBoundary::new(store.clone(), log.clone()));
    let publisher = Arc::new(RecordingPublisher::new(log.clone()));
    let pipeline = CommandPipeline::new(boundary, Arc::clone(&publisher));
    Harness {
        store,
        log,
        publisher,
        pipeline,
    }
}

fn full_batch(table_seq: u64, hand_seq: u64) -> CommandBatch {
    CommandBatch::builder()
        .event(bet_event("T1", "H1", table_seq, hand_seq))
        .table(
            TableMutation::new("T1")
                .with_status(TableStatus::Playing)
                .with_current_hand("H1"),
        )
        .seat(
            SeatMutation::new("T1", 1)
                .with_occupant("U1")
                .with_stack(980)
                .with_status(SeatStatus::Active),
        )
        .seat(SeatMutation::new("T1", 2).with_occupant("U2").with_stack(1_000))
        .hand(HandMutation::new("H1").with_street(Street::Flop).with_pot(20))
        .hand_player(HandPlayerUpsert::new("H1", "U1", 1).with_committed(20))
        .wallet_transaction(
            WalletTransaction::new("U1", -20, LedgerReason::Bet)
                .at_table("T1")
                .in_hand("H1"),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_valid_batch_applies_groups_in_order_then_publishes_once() {
    let h = harness().await;
    let batch = full_batch(1, 1);
    let event_id = batch.event().event_id;

    let receipt = h.pipeline.commit_and_publish(batch).await.unwrap();

    assert_eq!(
        h.log.steps(),
        vec![
            Step::Begin,
            Step::Op(TxOperation::AppendEvent),
            Step::Op(TxOperation::UpdateTable),
            Step::Op(TxOperation::UpdateSeats),
            Step::Op(TxOperation::UpdateHand),
            Step::Op(TxOperation::UpsertHandPlayers),
            Step::Op(TxOperation::AppendWalletTransactions),
            Step::Op(TxOperation::Commit),
            Step::Publish(event_id),
        ]
    );
    assert_eq!(receipt.event.event_id, event_id);
    assert_eq!(h.publisher.published(), vec![receipt.event.clone()]);

    let table = h.store.table(&TableId::new("T1")).await.unwrap();
    assert_eq!(table.status, TableStatus::Playing);
    assert_eq!(table.current_hand, Some(HandId::new("H1")));
    assert_eq!(table.last_table_seq, Some(1));

    let seat = h.store.seat(&TableId::new("T1"), 1).await.unwrap();
    assert_eq!(seat.occupant, Some(ActorId::new("U1")));
    assert_eq!(seat.stack, 980);

    let hand = h.store.hand(&HandId::new("H1")).await.unwrap();
    assert_eq!(hand.street, Street::Flop);
    assert_eq!(hand.pot, 20);
    assert_eq!(hand.status, HandStatus::InProgress);

    let player = h
        .store
        .hand_player(&HandId::new("H1"), &ActorId::new("U1"))
        .await
        .unwrap();
    assert_eq!(player.committed, 20);
    assert_eq!(h.store.ledger_for_actor(&ActorId::new("U1")).await.len(), 1);
    assert_eq!(h.store.stats().committed, 1);
}

#[tokio::test]
async fn test_absent_groups_are_not_invoked() {
    let h = harness().await;
    let batch = CommandBatch::builder()
        .event(bet_event("T1", "H1", 1, 1))
        .hand(HandMutation::new("H1").with_pot(40))
        .build()
        .unwrap();
    let event_id = batch.event().event_id;

    h.pipeline.commit_and_publish(batch).await.unwrap();

    assert_eq!(
        h.log.steps(),
        vec![
            Step::Begin,
            Step::Op(TxOperation::AppendEvent),
            Step::Op(TxOperation::UpdateHand),
            Step::Op(TxOperation::Commit),
            Step::Publish(event_id),
        ]
    );
}

#[tokio::test]
async fn test_failed_event_append_never_publishes_and_rolls_back_once() {
    let h = harness().await;
    // H2 is bound to T2.
    let batch = CommandBatch::builder()
        .event(bet_event("T1", "H2", 1, 1))
        .seat(SeatMutation::new("T1", 1).with_stack(5))
        .build()
        .unwrap();

    let err = h.pipeline.commit_and_publish(batch).await.unwrap_err();

    assert!(!err.is_committed());
    assert_eq!(h.log.publish_count(), 0);
    assert_eq!(h.log.count(&Step::Rollback), 1);
    assert_eq!(h.log.count(&Step::Op(TxOperation::UpdateSeats)), 0);
    assert_eq!(h.store.stats().rolled_back, 1);
    assert_eq!(h.store.stats().committed, 0);
    assert_eq!(h.store.seat(&TableId::new("T1"), 1).await.unwrap().stack, 0);
}

#[tokio::test]
async fn test_mid_batch_failure_rolls_back_the_event_too() {
    let h = harness().await;
    let batch = CommandBatch::builder()
        .event(bet_event("T1", "H1", 1, 1))
        .table(TableMutation::new("T1").with_button_seat(3))
        // Seat 9 does not exist on a six-seat table.
        .seat(SeatMutation::new("T1", 9).with_stack(100))
        .hand(HandMutation::new("H1").with_pot(99))
        .build()
        .unwrap();

    let err = h.pipeline.commit_and_publish(batch).await.unwrap_err();

    match err {
        CommitError::NotCommitted(StoreError::Invariant(InvariantViolation::MissingRow {
            entity,
            key,
        })) => {
            assert_eq!(entity, "seat");
            assert_eq!(key, "T1#9");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.log.count(&Step::Op(TxOperation::UpdateHand)), 0);
    assert_eq!(h.log.count(&Step::Op(TxOperation::Commit)), 0);
    assert_eq!(h.log.publish_count(), 0);
    assert_eq!(h.store.event_count().await, 0);

    let table = h.store.table(&TableId::new("T1")).await.unwrap();
    assert_eq!(table.button_seat, None);
    assert_eq!(table.last_table_seq, None);
}

#[tokio::test]
async fn test_publish_failure_leaves_state_committed() {
    let h = harness().await;
    h.publisher
        .fail_with(PublishError::Rejected("subscriber hub offline".to_string()));

    let err = h.pipeline.commit_and_publish(full_batch(1, 1)).await.unwrap_err();

    assert!(err.is_committed());
    assert!(matches!(err, CommitError::PublishFailed { .. }));
    let receipt = err.receipt().unwrap();
    assert_eq!(receipt.event.table_seq, 1);
    assert_eq!(h.log.publish_count(), 1);
    assert_eq!(h.log.count(&Step::Rollback), 0);
    assert_eq!(h.store.event_count().await, 1);
    assert_eq!(h.store.stats().committed, 1);
}

#[tokio::test]
async fn test_republish_after_publish_failure_does_not_recommit() {
    let h = harness().await;
    h.publisher.fail_with(PublishError::ChannelClosed);

    let err = h.pipeline.commit_and_publish(full_batch(1, 1)).await.unwrap_err();
    let receipt = err.receipt().unwrap().clone();

    h.publisher.recover();
    h.pipeline.republish(&receipt).await.unwrap();

    assert_eq!(h.log.publish_count(), 2);
    assert_eq!(h.log.count(&Step::Begin), 1);
    assert_eq!(h.publisher.published(), vec![receipt.event]);
    assert_eq!(h.store.event_count().await, 1);
}

#[tokio::test]
async fn test_transient_fault_is_reported_and_retry_succeeds() {
    let h = harness().await;
    h.store.inject_fault(TxOperation::AppendWalletTransactions);

    let batch = full_batch(1, 1);
    let retry = batch.clone();
    let err = h.pipeline.commit_and_publish(batch).await.unwrap_err();

    match &err {
        CommitError::NotCommitted(source) => assert!(source.is_transient()),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.store.event_count().await, 0);
    assert!(h.store.ledger_for_actor(&ActorId::new("U1")).await.is_empty());

    // Same batch, same sequence numbers: nothing from the first attempt survived.
    let receipt = h.pipeline.commit_and_publish(retry).await.unwrap();
    assert_eq!(receipt.event.table_seq, 1);
    assert_eq!(h.store.event_count().await, 1);
    assert_eq!(h.store.ledger_for_actor(&ActorId::new("U1")).await.len(), 1);
}

#[tokio::test]
async fn test_commit_fault_discards_applied_groups() {
    let h = harness().await;
    h.store.inject_fault(TxOperation::Commit);

    let err = h.pipeline.commit_and_publish(full_batch(1, 1)).await.unwrap_err();

    assert!(!err.is_committed());
    assert_eq!(h.log.publish_count(), 0);
    assert_eq!(h.store.event_count().await, 0);
    assert_eq!(h.store.hand(&HandId::new("H1")).await.unwrap().pot, 0);
}

#[tokio::test]
async fn test_duplicate_ledger_entry_rejects_batch() {
    let h = harness().await;
    let entry = WalletTransaction::new("U1", 500, LedgerReason::BuyIn).at_table("T1");

    let first = CommandBatch::builder()
        .event(bet_event("T1", "H1", 1, 1))
        .wallet_transaction(entry.clone())
        .build()
        .unwrap();
    h.pipeline.commit_and_publish(first).await.unwrap();

    let second = CommandBatch::builder()
        .event(bet_event("T1", "H1", 2, 2))
        .wallet_transaction(entry.clone())
        .build()
        .unwrap();
    let err = h.pipeline.commit_and_publish(second).await.unwrap_err();

    match err {
        CommitError::NotCommitted(StoreError::Invariant(InvariantViolation::DuplicateLedgerEntry(
            id,
        ))) => assert_eq!(id, entry.transaction_id),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.store.event_count().await, 1);
    assert_eq!(h.log.publish_count(), 1);
}
