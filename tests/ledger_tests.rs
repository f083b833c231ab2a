//! Ledger serialization, deduplication and persistence.


use std::sync::Arc;

use ledger_guard::backend::{BidHistoryQuery, BidLine, BidSubmission, UpiNumbers, WithdrawalRequest};
use ledger_guard::{Ledger, MarketSession, PayoutMethodKind, Session, WagerType};
use test_helpers::*;
use uuid::Uuid;

fn line(session: Session, bet_type: WagerType, digit: &str, amount: u64) -> BidLine {
    BidLine {
        market_id: MARKET,
        market_session: session,
        bet_type,
        bet_digit: digit.to_string(),
        bet_amount: amount,
        user_id: USER,
    }
}

fn single(digit: &str, amount: u64) -> BidSubmission {
    BidSubmission {
        idempotency_key: Uuid::new_v4(),
        bids: vec![line(Session::Open, WagerType::Single, digit, amount)],
    }
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_submissions_debit_once() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 500).await.unwrap();
    let submission = single("7", 200);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            let submission = submission.clone();
            tokio::spawn(async move { ledger.place_bids(&submission).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().unwrap().success);
    }

    assert_eq!(ledger.balance(USER).await, 300);
    assert_eq!(ledger.bid_history(&BidHistoryQuery { user_id: USER, ..Default::default() }).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_batches_cannot_overspend() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 100).await.unwrap();

    let a = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.place_bids(&single("1", 60)).await })
    };
    let b = {
        let ledger = ledger.clone();
        tokio::spawn(async move { ledger.place_bids(&single("2", 60)).await })
    };
    let accepted = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()]
        .iter()
        .filter(|r| r.success)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(ledger.balance(USER).await, 40);
}

#[tokio::test]
async fn test_back_to_back_submissions_both_visible() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 1000).await.unwrap();

    let (req_a, req_b) = (single("3", 100), single("4", 250));
    let (a, b) = tokio::join!(ledger.place_bids(&req_a), ledger.place_bids(&req_b));
    assert!(a.unwrap().success && b.unwrap().success);
    assert_eq!(ledger.balance(USER).await, 650);
}

#[tokio::test]
async fn test_users_are_independent() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 100).await.unwrap();
    ledger.credit(2, 900).await.unwrap();

    let mut other = single("5", 80);
    other.bids[0].user_id = 2;
    assert!(ledger.place_bids(&other).await.unwrap().success);

    assert_eq!(ledger.balance(USER).await, 100);
    assert_eq!(ledger.balance(2).await, 820);
}

// ============================================================================
// SERVER-SIDE VALIDATION
// ============================================================================

#[tokio::test]
async fn test_session_rule_rechecked() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 1000).await.unwrap();
    ledger.upsert_market(MarketSession { open_active: false, ..kalyan() });

    let open = single("7", 50);
    let reply = ledger.place_bids(&open).await.unwrap();
    assert!(!reply.success);
    assert!(reply.error_msg.contains("closed"));

    let close = BidSubmission {
        idempotency_key: Uuid::new_v4(),
        bids: vec![line(Session::Close, WagerType::Jodi, "42", 50)],
    };
    assert!(ledger.place_bids(&close).await.unwrap().success);
}

#[tokio::test]
async fn test_mixed_batch_rejected() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 1000).await.unwrap();

    let mut bids = vec![line(Session::Open, WagerType::Single, "1", 20)];
    let mut stray = line(Session::Open, WagerType::Single, "2", 20);
    stray.market_id = 99;
    bids.push(stray);
    let reply = ledger
        .place_bids(&BidSubmission { idempotency_key: Uuid::new_v4(), bids })
        .await
        .unwrap();
    assert!(!reply.success);

    let reply = ledger
        .place_bids(&BidSubmission { idempotency_key: Uuid::new_v4(), bids: vec![] })
        .await
        .unwrap();
    assert_eq!(reply.error_msg, "Please add bids to submit");
    assert_eq!(ledger.balance(USER).await, 1000);
}

#[tokio::test]
async fn test_panel_and_sangam_lines() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 1000).await.unwrap();

    let submission = BidSubmission {
        idempotency_key: Uuid::new_v4(),
        bids: vec![
            line(Session::Open, WagerType::SinglePanel, "127", 10),
            line(Session::Open, WagerType::DoublePanel, "112", 10),
            line(Session::Open, WagerType::TriplePanel, "000", 10),
            line(Session::Open, WagerType::HalfSangam, "3-120", 10),
            line(Session::Open, WagerType::FullSangam, "127-550", 10),
        ],
    };
    let reply = ledger.place_bids(&submission).await.unwrap();
    assert!(reply.success, "{}", reply.error_msg);
    assert_eq!(ledger.balance(USER).await, 950);

    // 721 is not in ascending rank order
    let reply = ledger
        .place_bids(&BidSubmission {
            idempotency_key: Uuid::new_v4(),
            bids: vec![line(Session::Open, WagerType::SinglePanel, "721", 10)],
        })
        .await
        .unwrap();
    assert!(!reply.success);
}

#[tokio::test]
async fn test_bid_history_filters() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 1000).await.unwrap();
    ledger
        .place_bids(&BidSubmission {
            idempotency_key: Uuid::new_v4(),
            bids: vec![
                line(Session::Open, WagerType::Single, "1", 10),
                line(Session::Close, WagerType::Single, "2", 10),
                line(Session::Open, WagerType::Jodi, "12", 10),
            ],
        })
        .await
        .unwrap();

    let all = BidHistoryQuery { user_id: USER, ..Default::default() };
    assert_eq!(ledger.bid_history(&all).len(), 3);

    let singles = BidHistoryQuery { bid_type: Some(WagerType::Single), ..all.clone() };
    assert_eq!(ledger.bid_history(&singles).len(), 2);

    let close_singles = BidHistoryQuery { bid_session: Some(Session::Close), ..singles };
    let found = ledger.bid_history(&close_singles);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].bet_digit, "2");

    let elsewhere = BidHistoryQuery { market_id: Some(99), ..all };
    assert!(ledger.bid_history(&elsewhere).is_empty());
}

#[tokio::test]
async fn test_overflowing_stakes_rejected() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 100).await.unwrap();

    let huge = BidSubmission {
        idempotency_key: Uuid::new_v4(),
        bids: vec![
            line(Session::Open, WagerType::Single, "1", 1 << 63),
            line(Session::Open, WagerType::Single, "2", 1 << 63),
        ],
    };
    let reply = ledger.place_bids(&huge).await.unwrap();
    assert!(!reply.success);

    // each line fits, the sum wraps u64
    let wrapping = BidSubmission {
        idempotency_key: Uuid::new_v4(),
        bids: vec![
            line(Session::Open, WagerType::Single, "1", i64::MAX as u64),
            line(Session::Open, WagerType::Single, "2", i64::MAX as u64),
            line(Session::Open, WagerType::Single, "3", 10),
        ],
    };
    let reply = ledger.place_bids(&wrapping).await.unwrap();
    assert!(!reply.success);
    assert_eq!(reply.error_msg, "Insufficient wallet balance.");

    assert_eq!(ledger.balance(USER).await, 100);
    assert!(ledger.bid_history(&BidHistoryQuery { user_id: USER, ..Default::default() }).is_empty());
}

// ============================================================================
// ACCOUNTS & IDEMPOTENCY KEYS
// ============================================================================

#[tokio::test]
async fn test_reads_do_not_create_accounts() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 100).await.unwrap();
    assert_eq!(ledger.account_count(), 1);

    assert_eq!(ledger.balance(42).await, 0);
    assert!(ledger.withdrawals_allowed(42).await);
    let mut stranger = single("4", 50);
    stranger.bids[0].user_id = 42;
    assert!(!ledger.place_bids(&stranger).await.unwrap().success);

    assert_eq!(ledger.account_count(), 1);
}

#[tokio::test]
async fn test_key_of_another_user_not_replayed() {
    let ledger = ledger_at(noon());
    ledger.credit(USER, 500).await.unwrap();
    ledger.credit(2, 500).await.unwrap();

    let mine = single("7", 100);
    assert!(ledger.place_bids(&mine).await.unwrap().success);

    let mut theirs = mine.clone();
    theirs.bids[0].user_id = 2;
    let reply = ledger.place_bids(&theirs).await.unwrap();
    assert!(!reply.success);
    assert_eq!(reply.error_msg, "Idempotency key already used");
    assert_eq!(ledger.balance(2).await, 500);

    // a bid key cannot be replayed as a withdrawal either
    let reply = ledger
        .request_withdrawal(&WithdrawalRequest {
            number: PayoutMethodKind::Paytm,
            user_id: USER,
            amount: 1000,
            idempotency_key: mine.idempotency_key,
        })
        .await
        .unwrap();
    assert!(!reply.status);
    assert_eq!(ledger.balance(USER).await, 400);
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let submission = single("9", 100);
    let withdrawal = WithdrawalRequest {
        number: PayoutMethodKind::Phonepe,
        user_id: USER,
        amount: 1000,
        idempotency_key: Uuid::new_v4(),
    };

    {
        let ledger = Ledger::open(dir.path(), day_policy(), clock_at(noon())).unwrap();
        ledger.upsert_market(kalyan());
        ledger.credit(USER, 5000).await.unwrap();
        ledger
            .store_upi_numbers(&UpiNumbers {
                user_id: USER,
                phonepe_number: Some("9000012345".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(ledger.place_bids(&submission).await.unwrap().success);
        assert!(ledger.request_withdrawal(&withdrawal).await.unwrap().status);
        assert_eq!(ledger.balance(USER).await, 3900);
    }

    let ledger = Arc::new(Ledger::open(dir.path(), day_policy(), clock_at(noon())).unwrap());
    ledger.upsert_market(kalyan());
    assert_eq!(ledger.balance(USER).await, 3900);
    assert!(ledger.profile(USER).unwrap().has(PayoutMethodKind::Phonepe));
    assert_eq!(ledger.pending_withdrawals(USER).len(), 1);
    assert_eq!(ledger.bid_history(&BidHistoryQuery { user_id: USER, ..Default::default() }).len(), 1);

    // receipts survive too: replays do not debit again
    assert!(ledger.place_bids(&submission).await.unwrap().success);
    assert!(ledger.request_withdrawal(&withdrawal).await.unwrap().status);
    assert_eq!(ledger.balance(USER).await, 3900);
}
