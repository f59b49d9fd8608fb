mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{reliable_runtime, wait_for};
use durable_patterns::adapters::http::router;
use durable_patterns::{DurableError, IngressClient, Target};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_object_call_and_state_snapshot() {
    let app = router(reliable_runtime());

    let (status, body) = send(&app, post("/GreeterObject/Alice/greet", json!("Hi"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Hi Alice for the 1-th time."));

    let (status, body) = send(&app, get("/restate/state/GreeterObject/Alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"count": 1}));
}

#[tokio::test]
async fn test_empty_body_is_unit_input() {
    let app = router(reliable_runtime());

    let request = Request::builder()
        .method("POST")
        .uri("/GreeterObject/Bob/ungreet")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("Dear Bob, taking one greeting back: 0."));
}

#[tokio::test]
async fn test_idempotency_key_returns_first_result() {
    let app = router(reliable_runtime());

    let call = || {
        Request::builder()
            .method("POST")
            .uri("/GreeterObject/Carol/greet")
            .header("content-type", "application/json")
            .header("idempotency-key", "greet-once")
            .body(Body::from("\"Hi\""))
            .unwrap()
    };
    let (_, first) = send(&app, call()).await;
    let (_, second) = send(&app, call()).await;

    assert_eq!(first, json!("Hi Carol for the 1-th time."));
    assert_eq!(second, first);

    let (_, state) = send(&app, get("/restate/state/GreeterObject/Carol")).await;
    assert_eq!(state, json!({"count": 1}));
}

#[tokio::test]
async fn test_one_way_call_is_accepted() {
    let runtime = reliable_runtime();
    let app = router(runtime.clone());

    let (status, body) = send(&app, post("/GreeterObject/Dave/greet/send", json!("Hi"))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["invocationId"].as_str().unwrap().starts_with("inv_"));

    wait_for(move || {
        runtime
            .state_snapshot("GreeterObject", "Dave")
            .get("count")
            .cloned()
    })
    .await;

    // 不存在的 handler 在接受前就被拒絕
    let (status, _) = send(&app, post("/GreeterObject/Dave/wave/send", json!("Hi"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // keyed 服務少了 key 也一樣
    let (status, body) = send(&app, post("/GreeterObject/greet/send", json!("Hi"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        json!("A key is required to invoke GreeterObject/greet")
    );
}

#[tokio::test]
async fn test_errors_carry_status_and_message() {
    let app = router(reliable_runtime());

    let (status, body) = send(&app, post("/Nope/handle", json!(null))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"code": 404, "message": "Service not found: Nope"}));

    let (status, body) = send(
        &app,
        post(
            "/Payments/process",
            json!({"amount": 0, "currency": "EUR", "customerId": "c", "orderId": "o"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Amount must be greater than 0"));

    let (status, _) = send(&app, post("/restate/awakeables/awk_missing/resolve", json!(1))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get("/restate/workflow/SignupWorkflow/nobody/output")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_discover_and_health() {
    let app = router(reliable_runtime());

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = send(&app, get("/discover")).await;
    assert_eq!(status, StatusCode::OK);
    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 20);

    let greeter = services
        .iter()
        .find(|s| s["name"] == "GreeterObject")
        .unwrap();
    assert_eq!(greeter["ty"], json!("VIRTUAL_OBJECT"));
    assert_eq!(greeter["handlers"][0], json!({"name": "greet", "ty": "EXCLUSIVE"}));
}

#[tokio::test]
async fn test_client_against_running_ingress() {
    let runtime = reliable_runtime();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(runtime.clone());
    tokio::spawn(async move { axum::serve(listener, app).await });

    let client = IngressClient::new(format!("http://{}", addr));

    let greeting: String = assert_ok!(
        client
            .call(&Target::object("GreeterObject", "Erin", "greet"), "Hi")
            .await
    );
    assert_eq!(greeting, "Hi Erin for the 1-th time.");

    // 使用者點擊連結前 output 仍是 409
    let invocation_id = assert_ok!(
        client
            .send(
                &Target::workflow("SignupWorkflow", "erin", "run"),
                &json!({"name": "Erin", "email": "erin@example.com"})
            )
            .await
    );
    assert!(invocation_id.starts_with("inv_"));

    let probe = runtime.clone();
    wait_for(move || {
        probe
            .workflow_output("SignupWorkflow", "erin")
            .err()
            .filter(|e| matches!(e, DurableError::WorkflowNotCompleted { .. }))
    })
    .await;
    let err = assert_err!(client.workflow_output::<bool>("SignupWorkflow", "erin").await);
    assert_eq!(err.status_code(), 409);

    assert_ok!(
        client
            .call::<_, Value>(&Target::workflow("SignupWorkflow", "erin", "click"), "wrong")
            .await
    );
    let verified: bool = assert_ok!(client.attach_workflow("SignupWorkflow", "erin").await);
    assert!(!verified);
}

#[tokio::test]
async fn test_client_sends_idempotency_key_and_maps_errors() {
    let server = MockServer::start();

    let call_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/CheckoutService/handle")
            .header("idempotency-key", "order-42")
            .json_body(json!({"userId": "alice", "tickets": ["seat-1"]}));
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!(true));
    });
    let missing_mock = server.mock(|when, then| {
        when.method(POST).path("/restate/awakeables/awk_gone/resolve");
        then.status(404)
            .header("Content-Type", "application/json")
            .json_body(json!({"code": 404, "message": "Awakeable not found: awk_gone"}));
    });
    let busy_mock = server.mock(|when, then| {
        when.method(GET).path("/restate/workflow/SignupWorkflow/x/attach");
        then.status(503)
            .json_body(json!({"code": 503, "message": "Transient failure: busy"}));
    });

    let client = IngressClient::new(server.base_url());

    let success: bool = assert_ok!(
        client
            .call_with_key(
                &Target::service("CheckoutService", "handle"),
                &json!({"userId": "alice", "tickets": ["seat-1"]}),
                Some("order-42"),
            )
            .await
    );
    assert!(success);
    call_mock.assert();

    let err = assert_err!(client.resolve_awakeable("awk_gone", &json!(true)).await);
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "Awakeable not found: awk_gone");
    missing_mock.assert();

    let err = assert_err!(client.attach_workflow::<Value>("SignupWorkflow", "x").await);
    assert!(matches!(err, DurableError::Transient { .. }));
    busy_mock.assert();
}
