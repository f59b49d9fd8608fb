mod common;

use common::{fast_services, runtime_with, wait_for};
use durable_patterns::app::services::{Account, PaymentProcessor};
use durable_patterns::core::{Endpoint, LocalRuntime};
use durable_patterns::domain::model::Outcome;
use durable_patterns::{ExternalClients, Target};
use serde_json::json;
use std::time::Duration;
use tokio_test::assert_ok;

const EXPIRY: Duration = Duration::from_secs(60);

/// 固定開戶金額 1000 cents 的帳戶，方便驗證餘額
fn runtime() -> LocalRuntime {
    let endpoint = Endpoint::builder()
        .bind(Account::with_opening_balance(1_000))
        .bind(PaymentProcessor::new(EXPIRY))
        .build();
    LocalRuntime::new(endpoint, common::fast_retries())
}

/// 尚未開戶的帳戶是 `None`
async fn balance(runtime: &LocalRuntime, account: &str) -> Option<i64> {
    let value = assert_ok!(
        runtime
            .invoke(Target::object("Account", account, "balance"), json!(null))
            .await
    );
    serde_json::from_value(value).unwrap()
}

async fn make_payment(runtime: &LocalRuntime, payment_id: &str, account: &str, amount: i64) -> Outcome {
    let value = assert_ok!(
        runtime
            .invoke(
                Target::object("PaymentProcessor", payment_id, "makePayment"),
                json!({"accountId": account, "amountCents": amount})
            )
            .await
    );
    serde_json::from_value(value).unwrap()
}

async fn cancel(runtime: &LocalRuntime, payment_id: &str) {
    assert_ok!(
        runtime
            .invoke(
                Target::object("PaymentProcessor", payment_id, "cancelPayment"),
                json!(null)
            )
            .await
    );
}

#[tokio::test]
async fn test_withdraw_never_overdraws() {
    let runtime = runtime();

    let outcome: Outcome = serde_json::from_value(assert_ok!(
        runtime
            .invoke(Target::object("Account", "acc-1", "withdraw"), json!(400))
            .await
    ))
    .unwrap();
    assert_eq!(outcome, Outcome::ok("Withdrawal successful"));
    assert_eq!(balance(&runtime, "acc-1").await, Some(600));

    let outcome: Outcome = serde_json::from_value(assert_ok!(
        runtime
            .invoke(Target::object("Account", "acc-1", "withdraw"), json!(700))
            .await
    ))
    .unwrap();
    assert_eq!(outcome, Outcome::rejected("Insufficient funds: 600 cents"));
    assert_eq!(balance(&runtime, "acc-1").await, Some(600));
}

#[tokio::test]
async fn test_deposit_adds_to_opening_balance() {
    let runtime = runtime();
    assert_eq!(balance(&runtime, "acc-2").await, None);

    assert_ok!(
        runtime
            .invoke(Target::object("Account", "acc-2", "deposit"), json!(250))
            .await
    );
    assert_eq!(balance(&runtime, "acc-2").await, Some(1_250));

    let err = runtime
        .invoke(Target::object("Account", "acc-2", "deposit"), json!(-5))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_deposit_overflow_is_rejected() {
    let runtime = runtime();

    let err = runtime
        .invoke(Target::object("Account", "acc-9", "deposit"), json!(i64::MAX))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
    assert!(err.is_terminal());

    // 開戶金額已記住，餘額不受影響
    assert_eq!(balance(&runtime, "acc-9").await, Some(1_000));
}

#[tokio::test]
async fn test_random_opening_balance_is_remembered() {
    let runtime = runtime_with(
        &ExternalClients::reliable(),
        &std::env::temp_dir(),
        &fast_services(),
    );

    // 超過任何開戶金額的提款會被拒絕，但開戶金額要被記住
    let first: Outcome = serde_json::from_value(assert_ok!(
        runtime
            .invoke(Target::object("Account", "acc-3", "withdraw"), json!(10_000_000))
            .await
    ))
    .unwrap();
    assert!(!first.success);

    let opening = balance(&runtime, "acc-3").await.unwrap();
    assert!((100_000..200_000).contains(&opening));
    assert_eq!(first.reason, format!("Insufficient funds: {} cents", opening));
}

#[tokio::test]
async fn test_payment_is_completed_only_once() {
    let runtime = runtime();

    let outcome = make_payment(&runtime, "pay-1", "acc-4", 300).await;
    assert!(outcome.success);

    let again = make_payment(&runtime, "pay-1", "acc-4", 300).await;
    assert_eq!(again, Outcome::rejected("Payment already completed in prior call"));
    assert_eq!(balance(&runtime, "acc-4").await, Some(700));
}

#[tokio::test]
async fn test_cancel_after_payment_refunds() {
    let runtime = runtime();

    assert!(make_payment(&runtime, "pay-2", "acc-5", 300).await.success);
    cancel(&runtime, "pay-2").await;

    // 退款以單向訊息送出
    let refunded = runtime.clone();
    wait_for(move || {
        let snapshot = refunded.state_snapshot("Account", "acc-5");
        (snapshot.get("balance") == Some(&json!(1_000))).then_some(())
    })
    .await;

    let after_cancel = make_payment(&runtime, "pay-2", "acc-5", 300).await;
    assert_eq!(after_cancel, Outcome::rejected("Payment already cancelled"));
}

#[tokio::test]
async fn test_cancel_before_payment_blocks_it() {
    let runtime = runtime();

    cancel(&runtime, "pay-3").await;
    let outcome = make_payment(&runtime, "pay-3", "acc-6", 300).await;

    assert_eq!(outcome, Outcome::rejected("Payment already cancelled"));
    assert_eq!(balance(&runtime, "acc-6").await, None);
}

#[tokio::test]
async fn test_failed_withdrawal_leaves_payment_retryable() {
    let runtime = runtime();

    let outcome = make_payment(&runtime, "pay-4", "acc-7", 5_000).await;
    assert!(!outcome.success);
    assert!(runtime.state_snapshot("PaymentProcessor", "pay-4").is_empty());

    let retry = make_payment(&runtime, "pay-4", "acc-7", 500).await;
    assert!(retry.success);
}

#[tokio::test(start_paused = true)]
async fn test_payment_state_expires() {
    let runtime = runtime();

    assert!(make_payment(&runtime, "pay-5", "acc-8", 100).await.success);
    assert!(!runtime.state_snapshot("PaymentProcessor", "pay-5").is_empty());

    tokio::time::sleep(EXPIRY + Duration::from_secs(1)).await;
    let expired = runtime.clone();
    wait_for(move || {
        expired
            .state_snapshot("PaymentProcessor", "pay-5")
            .is_empty()
            .then_some(())
    })
    .await;

    // 過期後同一個 id 可以再付款
    assert!(make_payment(&runtime, "pay-5", "acc-8", 100).await.success);
    assert_eq!(balance(&runtime, "acc-8").await, Some(800));
}
