mod common;

use common::{fast_services, runtime_with, wait_for, Calls, RecordingEmail, RecordingPayments};
use durable_patterns::config::toml_config::ServicesConfig;
use durable_patterns::{ExternalClients, LocalRuntime, Target};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::assert_ok;

const TTL_SECS: u64 = 15 * 60;

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
    let services = ServicesConfig {
        reservation_ttl_secs: TTL_SECS,
        ..fast_services()
    };
    Harness {
        runtime: runtime_with(&clients, &std::env::temp_dir(), &services),
        payments: payment_calls,
        emails: email_calls,
    }
}

async fn add_ticket(runtime: &LocalRuntime, user: &str, ticket: &str) -> Value {
    assert_ok!(
        runtime
            .invoke(Target::object("CartObject", user, "addTicket"), json!(ticket))
            .await
    )
}

fn ticket_status(runtime: &LocalRuntime, ticket: &str) -> Option<Value> {
    runtime.state_snapshot("TicketObject", ticket).get("status").cloned()
}

#[tokio::test]
async fn test_ticket_can_only_be_reserved_once() {
    let h = harness(false);

    assert_eq!(add_ticket(&h.runtime, "alice", "seat-1").await, json!(true));
    assert_eq!(add_ticket(&h.runtime, "bob", "seat-1").await, json!(false));

    assert_eq!(ticket_status(&h.runtime, "seat-1"), Some(json!("Reserved")));
    assert_eq!(
        h.runtime.state_snapshot("CartObject", "alice").get("tickets"),
        Some(&json!(["seat-1"]))
    );
    assert!(h.runtime.state_snapshot("CartObject", "bob").is_empty());
}

#[tokio::test]
async fn test_checkout_sells_tickets_and_clears_cart() {
    let h = harness(false);
    add_ticket(&h.runtime, "alice", "seat-1").await;
    add_ticket(&h.runtime, "alice", "seat-2").await;

    let success = assert_ok!(
        h.runtime
            .invoke(Target::object("CartObject", "alice", "checkout"), json!(null))
            .await
    );
    assert_eq!(success, json!(true));
    assert_eq!(h.payments.all(), vec!["charge 80"]);
    assert_eq!(h.emails.all(), vec!["success alice"]);
    assert!(h.runtime.state_snapshot("CartObject", "alice").is_empty());

    let runtime = h.runtime.clone();
    wait_for(move || {
        (ticket_status(&runtime, "seat-1") == Some(json!("Sold"))
            && ticket_status(&runtime, "seat-2") == Some(json!("Sold")))
        .then_some(())
    })
    .await;
}

#[tokio::test]
async fn test_empty_cart_checkout_fails_without_charging() {
    let h = harness(false);

    let success = assert_ok!(
        h.runtime
            .invoke(Target::object("CartObject", "carol", "checkout"), json!(null))
            .await
    );
    assert_eq!(success, json!(false));
    assert!(h.payments.all().is_empty());
}

#[tokio::test]
async fn test_declined_checkout_keeps_the_cart() {
    let h = harness(true);
    add_ticket(&h.runtime, "dave", "seat-9").await;

    let success = assert_ok!(
        h.runtime
            .invoke(Target::object("CartObject", "dave", "checkout"), json!(null))
            .await
    );
    assert_eq!(success, json!(false));
    assert_eq!(h.emails.all(), vec!["failure dave"]);
    assert_eq!(
        h.runtime.state_snapshot("CartObject", "dave").get("tickets"),
        Some(&json!(["seat-9"]))
    );
    assert_eq!(ticket_status(&h.runtime, "seat-9"), Some(json!("Reserved")));
}

#[tokio::test(start_paused = true)]
async fn test_reservation_expires_after_ttl() {
    let h = harness(false);
    add_ticket(&h.runtime, "erin", "seat-4").await;

    tokio::time::sleep(Duration::from_secs(TTL_SECS + 1)).await;
    let runtime = h.runtime.clone();
    wait_for(move || ticket_status(&runtime, "seat-4").is_none().then_some(())).await;

    assert_eq!(
        h.runtime.state_snapshot("CartObject", "erin").get("tickets"),
        Some(&json!([]))
    );
    // 過期的票可以被別人預訂
    assert_eq!(add_ticket(&h.runtime, "frank", "seat-4").await, json!(true));
}

#[tokio::test(start_paused = true)]
async fn test_sold_ticket_is_not_released_by_expiry() {
    let h = harness(false);
    add_ticket(&h.runtime, "gina", "seat-5").await;
    assert_ok!(
        h.runtime
            .invoke(Target::object("CartObject", "gina", "checkout"), json!(null))
            .await
    );

    tokio::time::sleep(Duration::from_secs(TTL_SECS + 1)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(ticket_status(&h.runtime, "seat-5"), Some(json!("Sold")));
    assert_eq!(add_ticket(&h.runtime, "hank", "seat-5").await, json!(false));
}
