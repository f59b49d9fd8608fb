mod common;

use chrono::Utc;
use common::{fast_services, runtime_with, wait_for, Calls, RecordingEmail, RecordingPayments};
use durable_patterns::domain::model::PaymentResult;
use durable_patterns::{DurableError, ExternalClients, LocalRuntime, Target};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct Harness {
    runtime: LocalRuntime,
    payments: Calls,
    emails: Calls,
}

fn harness(decline: bool) -> Harness {
    let payments = RecordingPayments {
        decline,
        ..Default::default()
    };
    let email = RecordingEmail::default();
    let (payment_calls, email_calls) = (payments.calls.clone(), email.calls.clone());

    let clients = ExternalClients {
        payments: Arc::new(payments),
        email: Arc::new(email),
        ..ExternalClients::reliable()
    };
    Harness {
        runtime: runtime_with(&clients, &std::env::temp_dir(), &fast_services()),
        payments: payment_calls,
        emails: email_calls,
    }
}

fn payment_request(amount: i64) -> Value {
    json!({
        "amount": amount,
        "currency": "EUR",
        "customerId": "customer-1",
        "orderId": "order-1"
    })
}

#[tokio::test]
async fn test_payment_waits_for_confirmation() {
    let h = harness(false);
    let process = tokio::spawn(
        h.runtime
            .invoke(Target::service("Payments", "process"), payment_request(100)),
    );

    let awakeable_id = wait_for(|| h.payments.find("init ")).await;
    assert!(awakeable_id.starts_with("awk_"));

    assert_ok!(
        h.runtime
            .invoke(
                Target::service("Payments", "confirm"),
                json!({"id": awakeable_id, "result": {"success": true, "transactionId": "tx-1"}})
            )
            .await
    );

    let output = assert_ok!(process.await.unwrap());
    let result: PaymentResult = serde_json::from_value(output).unwrap();
    assert!(result.success);
    assert_eq!(result.transaction_id.as_deref(), Some("tx-1"));
}

#[tokio::test]
async fn test_rejected_awakeable_fails_the_payment() {
    let h = harness(false);
    let process = tokio::spawn(
        h.runtime
            .invoke(Target::service("Payments", "process"), payment_request(100)),
    );

    let awakeable_id = wait_for(|| h.payments.find("init ")).await;
    assert_ok!(h.runtime.reject_awakeable(&awakeable_id, "Card expired"));

    let err = assert_err!(process.await.unwrap());
    assert!(err.is_terminal());
    assert_eq!(err.to_string(), "Card expired");

    // 已經完成的 awakeable 不能再被解析
    let err = assert_err!(h.runtime.resolve_awakeable(&awakeable_id, json!(null)));
    assert!(matches!(err, DurableError::AwakeableNotFound { .. }));
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let h = harness(false);

    let err = assert_err!(
        h.runtime
            .invoke(Target::service("Payments", "process"), payment_request(0))
            .await
    );
    assert_eq!(err.status_code(), 400);
    assert_eq!(err.to_string(), "Amount must be greater than 0");
    assert!(h.payments.all().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_payment_times_out_and_cancels() {
    let h = harness(false);

    let output = assert_ok!(
        h.runtime
            .invoke(
                Target::service("PaymentsWithTimeout", "process"),
                payment_request(100)
            )
            .await
    );
    let result: PaymentResult = serde_json::from_value(output).unwrap();
    assert_eq!(result, PaymentResult::timed_out());
    assert_eq!(h.payments.find("cancel ").as_deref(), Some("payRef-order-1"));

    // 逾時後 awakeable 已註銷，遲到的確認得到 404
    let awakeable_id = h.payments.find("init ").unwrap();
    let err = assert_err!(h.runtime.resolve_awakeable(&awakeable_id, json!({"success": true})));
    assert!(matches!(err, DurableError::AwakeableNotFound { .. }));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_payment_beats_the_timeout() {
    let h = harness(false);
    let process = tokio::spawn(h.runtime.invoke(
        Target::service("PaymentsWithTimeout", "process"),
        payment_request(100),
    ));

    let awakeable_id = wait_for(|| h.payments.find("init ")).await;
    assert_ok!(
        h.runtime
            .invoke(
                Target::service("PaymentsWithTimeout", "confirm"),
                json!({"id": awakeable_id, "result": {"success": true}})
            )
            .await
    );

    let output = assert_ok!(process.await.unwrap());
    assert_eq!(output, json!({"success": true}));
    assert_eq!(h.payments.count("cancel"), 0);
}

fn ticket_request(concert: chrono::DateTime<Utc>) -> Value {
    json!({
        "ticketId": "ticket-7",
        "concertDateTime": concert.to_rfc3339(),
        "price": 40.0,
        "customerEmail": "fan@example.com"
    })
}

#[tokio::test(start_paused = true)]
async fn test_ticket_purchase_emails_ticket_and_reminder() {
    let h = harness(false);
    let concert = Utc::now() + chrono::Duration::days(3);

    let output = assert_ok!(
        h.runtime
            .invoke(
                Target::service("ConcertTicketingService", "buy"),
                ticket_request(concert)
            )
            .await
    );
    let message = output.as_str().unwrap();
    assert!(message.starts_with("Ticket purchased successfully with payment reference: "));
    assert_eq!(h.payments.all(), vec!["charge 40"]);

    wait_for(|| h.emails.find("ticket ticket-7")).await;
    assert_eq!(h.emails.count("reminder"), 0);

    // 提醒在演唱會前一天送出
    tokio::time::advance(Duration::from_secs(3 * 24 * 60 * 60)).await;
    wait_for(|| h.emails.find("reminder ticket-7")).await;
}

#[tokio::test]
async fn test_declined_ticket_payment_sends_nothing() {
    let h = harness(true);

    let err = assert_err!(
        h.runtime
            .invoke(
                Target::service("ConcertTicketingService", "buy"),
                ticket_request(Utc::now() + chrono::Duration::days(3))
            )
            .await
    );
    assert_eq!(err.status_code(), 402);
    assert_eq!(err.to_string(), "Payment declined for ticket ticket-7");

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(h.emails.all().is_empty());
}

#[tokio::test]
async fn test_invalid_concert_date_is_rejected_before_charging() {
    let h = harness(false);

    let err = assert_err!(
        h.runtime
            .invoke(
                Target::service("ConcertTicketingService", "buy"),
                json!({
                    "ticketId": "ticket-8",
                    "concertDateTime": "next friday",
                    "price": 40.0,
                    "customerEmail": "fan@example.com"
                })
            )
            .await
    );
    assert_eq!(err.status_code(), 400);
    assert!(h.payments.all().is_empty());
}
