//! Batch submission against scripted and ledger-backed collaborators.


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledger_guard::backend::{BidHistoryQuery, BidResponse, BidSubmission};
use ledger_guard::{
    BackendError, BatchSubmitter, LocalBackend, Outcome, SettlementApi, SettlementKind, SubmitError,
};
use test_helpers::*;

const TIMEOUT: Duration = Duration::from_secs(5);

fn rejected(message: &str) -> Result<BidResponse, BackendError> {
    Ok(BidResponse {
        success: false,
        error_msg: message.to_string(),
    })
}

// ============================================================================
// PRECONDITIONS
// ============================================================================

#[tokio::test]
async fn test_insufficient_funds_makes_no_call() {
    let ledger = ledger_at(noon());
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::replying(rejected("unused"));
    let submitter = BatchSubmitter::new(settlement.clone(), notifier, TIMEOUT);

    let mut batch = batch_of(&ledger, &[50, 50, 50, 50]);
    assert_eq!(batch.totals().total_stake, 200);

    let err = submitter.submit(&mut batch, 150).await.unwrap_err();
    assert_eq!(err, SubmitError::InsufficientFunds { required: 200, available: 150 });
    assert!(err.is_local());
    assert_eq!(settlement.calls(), 0);
    assert_eq!(batch.len(), 4);
}

#[tokio::test]
async fn test_empty_batch_makes_no_call() {
    let ledger = ledger_at(noon());
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::replying(rejected("unused"));
    let submitter = BatchSubmitter::new(settlement.clone(), notifier.clone(), TIMEOUT);

    let mut batch = batch_of(&ledger, &[]);
    assert_eq!(submitter.submit(&mut batch, 1000).await, Err(SubmitError::EmptyBatch));
    assert_eq!(submitter.submit_fresh(&mut batch).await, Err(SubmitError::EmptyBatch));
    assert_eq!(settlement.calls(), 0);
    assert_eq!(notifier.balance_guard().refresh_count(), 0);
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[tokio::test]
async fn test_rejection_leaves_batch_identical() {
    let ledger = ledger_at(noon());
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::replying(rejected("Market is closed"));
    let submitter = BatchSubmitter::new(settlement.clone(), notifier.clone(), TIMEOUT);
    let mut events = notifier.subscribe();

    let mut batch = batch_of(&ledger, &[50, 20, 30]);
    let before = batch.drafts().to_vec();
    let token = batch.idempotency_token();

    let err = submitter.submit(&mut batch, 1000).await.unwrap_err();
    assert_eq!(err, SubmitError::Rejected { message: "Market is closed".into() });
    assert_eq!(batch.drafts(), before.as_slice());
    assert_eq!(batch.idempotency_token(), token);

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, SettlementKind::Batch);
    assert_eq!(event.outcome, Outcome::Rejected);
    assert_eq!(event.message, "Market is closed");

    // balance reconciled even on failure
    assert!(submitter.await_reconciliation().await.unwrap().is_ok());
    assert_eq!(notifier.balance_guard().refresh_count(), 1);
}

#[tokio::test]
async fn test_accepted_batch_clears_and_reconciles() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 500).await.unwrap();
    let (backend, notifier) = client(&ledger);
    let submitter = BatchSubmitter::new(backend, notifier.clone(), TIMEOUT);

    let mut batch = batch_of(&ledger, &[50, 50]);
    let token = batch.idempotency_token();

    let outcome = submitter.submit_fresh(&mut batch).await.unwrap();
    assert_eq!(outcome.message, "Bids placed successfully");
    assert_eq!(outcome.idempotency_key, token);
    assert_eq!(outcome.total_stake, 100);
    assert!(batch.is_empty());
    assert_ne!(batch.idempotency_token(), token);

    assert_eq!(submitter.await_reconciliation().await, Some(Ok(400)));
    assert_eq!(notifier.balance_guard().current(), 400);
}

#[tokio::test]
async fn test_submit_fresh_uses_authoritative_balance() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 150).await.unwrap();
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::replying(rejected("unused"));
    let submitter = BatchSubmitter::new(settlement.clone(), notifier.clone(), TIMEOUT);

    let mut batch = batch_of(&ledger, &[100, 100]);
    let err = submitter.submit_fresh(&mut batch).await.unwrap_err();

    assert_eq!(err, SubmitError::InsufficientFunds { required: 200, available: 150 });
    assert_eq!(notifier.balance_guard().refresh_count(), 1);
    assert_eq!(settlement.calls(), 0);
}

#[tokio::test]
async fn test_network_failure_is_known_failure() {
    let ledger = ledger_at(noon());
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::replying(Err(BackendError::Network("connection refused".into())));
    let submitter = BatchSubmitter::new(settlement, notifier, TIMEOUT);

    let mut batch = batch_of(&ledger, &[50]);
    let err = submitter.submit(&mut batch, 100).await.unwrap_err();
    assert!(matches!(err, SubmitError::Network(_)));
    assert!(!err.outcome_unknown());
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn test_malformed_response_is_unknown() {
    let ledger = ledger_at(noon());
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::replying(Err(BackendError::Malformed("HTTP 502".into())));
    let submitter = BatchSubmitter::new(settlement, notifier.clone(), TIMEOUT);
    let mut events = notifier.subscribe();

    let mut batch = batch_of(&ledger, &[50]);
    let err = submitter.submit(&mut batch, 100).await.unwrap_err();
    assert!(err.outcome_unknown());
    assert_eq!(events.recv().await.unwrap().outcome, Outcome::Unknown);
    assert_eq!(batch.len(), 1);
}

// ============================================================================
// TIMEOUTS & IN-FLIGHT GUARD
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_unknown_outcome() {
    let ledger = ledger_at(noon());
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::slow(rejected("late"), Duration::from_secs(60));
    let submitter = BatchSubmitter::new(settlement.clone(), notifier.clone(), Duration::from_secs(1));
    let mut events = notifier.subscribe();

    let mut batch = batch_of(&ledger, &[50, 50]);
    let err = submitter.submit(&mut batch, 500).await.unwrap_err();

    assert_eq!(err, SubmitError::Timeout);
    assert!(err.outcome_unknown());
    assert_eq!(batch.len(), 2);
    assert_eq!(events.recv().await.unwrap().outcome, Outcome::Unknown);
    assert_eq!(settlement.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_submit_while_in_flight_is_refused() {
    let ledger = ledger_at(noon());
    let (_, notifier) = client(&ledger);
    let settlement = CountingSettlement::slow(
        Ok(BidResponse { success: true, error_msg: "ok".into() }),
        Duration::from_millis(200),
    );
    let submitter = BatchSubmitter::new(settlement.clone(), notifier, TIMEOUT);

    let mut first = batch_of(&ledger, &[50]);
    let mut second = batch_of(&ledger, &[50]);
    let (a, b) = tokio::join!(submitter.submit(&mut first, 500), submitter.submit(&mut second, 500));

    assert!(a.is_ok());
    assert_eq!(b, Err(SubmitError::InProgress));
    assert_eq!(settlement.calls(), 1);
    assert_eq!(second.len(), 1);

    // released afterwards
    assert!(submitter.submit(&mut second, 500).await.is_ok());
}

/// Applies the submission, then loses the response.
struct LostReply {
    inner: LocalBackend,
}

#[async_trait]
impl SettlementApi for LostReply {
    async fn submit_bids(&self, submission: &BidSubmission) -> Result<BidResponse, BackendError> {
        self.inner.submit_bids(submission).await?;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(BackendError::Network("unreachable".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_timeout_is_deduplicated() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 500).await.unwrap();
    let (backend, notifier) = client(&ledger);

    let lossy = BatchSubmitter::new(
        Arc::new(LostReply { inner: LocalBackend::new(ledger.clone()) }),
        notifier.clone(),
        Duration::from_secs(1),
    );
    let mut batch = batch_of(&ledger, &[100, 50]);
    let token = batch.idempotency_token();

    assert_eq!(lossy.submit_fresh(&mut batch).await, Err(SubmitError::Timeout));
    assert_eq!(batch.idempotency_token(), token);

    assert_eq!(ledger.balance(USER).await, 350);

    // same token: the ledger replays its receipt instead of debiting again
    let reliable = BatchSubmitter::new(backend, notifier, TIMEOUT);
    let outcome = reliable.submit_fresh(&mut batch).await.unwrap();
    assert_eq!(outcome.idempotency_key, token);
    assert!(batch.is_empty());
    assert_eq!(ledger.balance(USER).await, 350);

    let history = ledger.bid_history(&BidHistoryQuery { user_id: USER, ..Default::default() });
    assert_eq!(history.len(), 2);
}
