//! Transaction lifecycle, savepoints, and fault handling end to end.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use steadydb_command::Command;
use steadydb_driver::FaultCode;
use steadydb_exec::{
    Error, Executor, ExecutorConfig, IsolationLevel, Outcome, Transaction, TransactionState,
};
use steadydb_testing::{Event, FakeDriver, FakeResponse};

fn executor(driver: &FakeDriver) -> Executor {
    let config = ExecutorConfig::new()
        .connect_timeout(Duration::from_secs(1))
        .command_timeout(Duration::from_secs(1));
    Executor::new(Arc::new(driver.clone()), config).unwrap()
}

async fn begin(executor: &Executor) -> Transaction {
    executor
        .begin_transaction(IsolationLevel::ReadCommitted, None, &CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn begin_records_isolation_level() {
    let driver = FakeDriver::new();
    let executor = executor(&driver);

    let tx = executor
        .begin_transaction(IsolationLevel::Serializable, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(tx.state(), TransactionState::Active);
    assert_eq!(tx.isolation(), IsolationLevel::Serializable);
    assert!(driver
        .journal()
        .contains(&Event::Begun(IsolationLevel::Serializable)));
}

#[tokio::test]
async fn commit_finishes_the_transaction() {
    let driver = FakeDriver::new();
    driver.push_response(FakeResponse::Affected(1));
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    let command = Command::insert("orders").parameter("id", 1i64);
    assert_eq!(tx.execute(&command, &cancel).await.unwrap(), Outcome::Affected(1));
    tx.commit(&cancel).await.unwrap();

    assert_eq!(tx.state(), TransactionState::Committed);
    assert!(driver.journal().contains(&Event::Committed));

    // Finished transactions accept no more statements.
    let err = tx.execute(&command, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition(_)));
}

#[tokio::test]
async fn savepoint_rollback_removes_the_suffix() {
    let driver = FakeDriver::new();
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    tx.create_savepoint("a", &cancel).await.unwrap();
    tx.create_savepoint("b", &cancel).await.unwrap();
    tx.create_savepoint("c", &cancel).await.unwrap();

    tx.rollback_to_savepoint("b", &cancel).await.unwrap();

    // "b" and everything after it are gone; "a" survives.
    assert_eq!(tx.savepoint_names().collect::<Vec<_>>(), vec!["a"]);
    let err = tx.rollback_to_savepoint("c", &cancel).await.unwrap_err();
    assert!(matches!(err, Error::UnknownSavepoint(name) if name == "c"));
}

#[tokio::test]
async fn duplicate_savepoint_name_is_rejected() {
    let driver = FakeDriver::new();
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    tx.create_savepoint("checkpoint", &cancel).await.unwrap();
    let err = tx.create_savepoint("checkpoint", &cancel).await.unwrap_err();

    assert!(matches!(err, Error::SavepointExists(name) if name == "checkpoint"));
    // The failed attempt never reached the engine.
    let created = driver
        .journal()
        .iter()
        .filter(|event| matches!(event, Event::SavepointCreated(_)))
        .count();
    assert_eq!(created, 1);
}

#[tokio::test]
async fn rollback_is_idempotent() {
    let driver = FakeDriver::new();
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    tx.rollback(&cancel).await.unwrap();
    tx.rollback(&cancel).await.unwrap();

    assert_eq!(tx.state(), TransactionState::RolledBack);
    assert_eq!(driver.rollback_count(), 1);
}

#[tokio::test]
async fn dispose_rolls_back_an_open_transaction() {
    let driver = FakeDriver::new();
    let executor = executor(&driver);

    let mut tx = begin(&executor).await;
    tx.dispose().await;

    assert_eq!(tx.state(), TransactionState::Disposed);
    assert!(driver.journal().contains(&Event::RolledBack));
    assert!(driver.journal().contains(&Event::Closed));

    // Idempotent.
    tx.dispose().await;
    assert_eq!(driver.rollback_count(), 1);
}

#[tokio::test]
async fn statement_fault_moves_to_faulted_without_rollback() {
    let driver = FakeDriver::new();
    driver.push_response(FakeResponse::Fail(FaultCode::ConstraintViolation));
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    let command = Command::insert("orders").parameter("id", 1i64);
    let err = tx.execute(&command, &cancel).await.unwrap_err();

    assert!(matches!(err, Error::Transaction { .. }));
    assert_eq!(tx.state(), TransactionState::Faulted);
    // Faulting is the caller's signal; nothing is rolled back for them.
    assert_eq!(driver.rollback_count(), 0);

    // Further statements are refused until the caller resolves the fault.
    let err = tx.execute(&command, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition(_)));

    tx.rollback(&cancel).await.unwrap();
    assert_eq!(tx.state(), TransactionState::RolledBack);
}

#[tokio::test]
async fn transient_faults_are_not_retried_inside_a_transaction() {
    let driver = FakeDriver::new();
    driver.push_response(FakeResponse::Fail(FaultCode::DeadlockVictim));
    let executor = executor(&driver);

    let mut tx = begin(&executor).await;
    let command = Command::update("orders").parameter("total", 2i64);
    let err = tx
        .execute(&command, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        Error::Transaction { source } => assert_eq!(source.code, FaultCode::DeadlockVictim),
        other => panic!("expected Transaction, got {other:?}"),
    }
    let dispatches = driver
        .journal()
        .iter()
        .filter(|event| matches!(event, Event::Dispatched(_)))
        .count();
    assert_eq!(dispatches, 1);
}

#[tokio::test]
async fn commit_failure_surfaces_and_faults() {
    let driver = FakeDriver::new();
    driver.fail_next_commit(FaultCode::Timeout);
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    let err = tx.commit(&cancel).await.unwrap_err();

    assert!(matches!(err, Error::Transaction { .. }));
    assert_eq!(tx.state(), TransactionState::Faulted);

    // The caller can still resolve the transaction explicitly.
    tx.rollback(&cancel).await.unwrap();
    assert_eq!(tx.state(), TransactionState::RolledBack);
}

#[tokio::test]
async fn savepoint_recovers_a_faulted_transaction() {
    let driver = FakeDriver::new();
    driver.push_response(FakeResponse::Affected(1));
    driver.push_response(FakeResponse::Fail(FaultCode::ConstraintViolation));
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = executor
        .begin_transaction(IsolationLevel::ReadCommitted, None, &cancel)
        .await
        .unwrap();

    let insert = Command::insert("orders").parameter("id", 1i64);
    assert_eq!(tx.execute(&insert, &cancel).await.unwrap(), Outcome::Affected(1));

    tx.create_savepoint("before_update", &cancel).await.unwrap();

    let update = Command::update("orders").parameter("total", 2i64);
    let err = tx.execute(&update, &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Transaction { .. }));
    assert_eq!(tx.state(), TransactionState::Faulted);

    // Rolling back to the savepoint is the recovery path: the work before
    // it is preserved and the transaction can commit.
    tx.rollback_to_savepoint("before_update", &cancel).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Active);

    tx.commit(&cancel).await.unwrap();
    assert_eq!(tx.state(), TransactionState::Committed);
    assert!(driver.journal().contains(&Event::Committed));
}

#[tokio::test]
async fn cancelled_token_stops_control_operations_before_dispatch() {
    let driver = FakeDriver::new();
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    cancel.cancel();

    assert!(matches!(
        tx.create_savepoint("a", &cancel).await.unwrap_err(),
        Error::Cancelled
    ));
    assert!(matches!(tx.commit(&cancel).await.unwrap_err(), Error::Cancelled));
    assert!(matches!(tx.rollback(&cancel).await.unwrap_err(), Error::Cancelled));

    // Nothing reached the engine and the transaction is still usable.
    assert_eq!(tx.state(), TransactionState::Active);
    assert_eq!(driver.rollback_count(), 0);
    assert!(!driver
        .journal()
        .iter()
        .any(|event| matches!(event, Event::SavepointCreated(_) | Event::Committed)));

    tx.rollback(&CancellationToken::new()).await.unwrap();
    assert_eq!(tx.state(), TransactionState::RolledBack);
}

#[tokio::test]
async fn cancellation_mid_statement_faults_but_dispose_still_rolls_back() {
    let driver = FakeDriver::new();
    driver.push_response(FakeResponse::Stall);
    let executor = executor(&driver);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let mut tx = begin(&executor).await;
    let command = Command::insert("orders").parameter("id", 1i64);
    let err = tx.execute(&command, &cancel).await.unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(tx.state(), TransactionState::Faulted);

    // The dispose-time rollback ignores the caller's cancellation.
    tx.dispose().await;
    assert_eq!(tx.state(), TransactionState::Disposed);
    assert_eq!(driver.rollback_count(), 1);
}

#[tokio::test]
async fn disposed_transaction_rejects_savepoint_operations_as_invalid_state() {
    let driver = FakeDriver::new();
    let executor = executor(&driver);
    let cancel = CancellationToken::new();

    let mut tx = begin(&executor).await;
    tx.dispose().await;

    assert!(matches!(
        tx.create_savepoint("late", &cancel).await.unwrap_err(),
        Error::InvalidStateTransition(_)
    ));
    assert!(matches!(
        tx.commit(&cancel).await.unwrap_err(),
        Error::InvalidStateTransition(_)
    ));
    // Rollback stays an idempotent no-op even after disposal.
    tx.rollback(&cancel).await.unwrap();
}
