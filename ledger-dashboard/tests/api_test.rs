mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{ledger_totals, ledger_with_order, party, payment, range, FakeBackend};
use http_body_util::BodyExt;
use ledger_dashboard::models::Floor;
use ledger_dashboard::startup::build_router;
use ledger_dashboard::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

const LEDGER_URI: &str =
    "/api/floors/ground/parties/42/ledger?startDate=2024-04-01&endDate=2025-03-31";
const SESSION_URI: &str = "/api/floors/ground/parties/42/ledger";

fn app(backend: Arc<FakeBackend>) -> Router {
    build_router(AppState::new(backend, 500))
}

fn seeded_backend() -> Arc<FakeBackend> {
    let backend = FakeBackend::new();
    backend.set_ledger(ledger_with_order(42, 500, (8_000, 3_000), Some((2_000, 2_000))));
    backend.set_payments(Floor::Ground, vec![payment(900, 500, None, 8_000, 3_000)]);
    backend
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

async fn post_json(app: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let (status, body) = send(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_check_works() {
    let app = app(FakeBackend::new());
    let (status, body) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn opening_a_ledger_lists_due_actions_and_builds_the_index() {
    let backend = seeded_backend();
    let app = app(backend.clone());

    let (status, body) = get_json(&app, LEDGER_URI).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ledger"]["state"], "loaded");
    assert_eq!(body["ledger"]["data"]["partyId"], 42);
    assert_eq!(body["actionLabels"], json!(["Official Due: ₹5000"]));
    assert_eq!(body["flow"]["state"], "idle");
    assert_eq!(backend.payment_list_calls(Floor::Ground), 1);

    let (_, index) = get_json(&app, "/api/floors/GROUND/payments/index").await;
    assert_eq!(index["status"]["status"], "loaded");
    assert_eq!(index["entries"], 1);
}

#[tokio::test]
async fn record_payment_round_trip() {
    let backend = seeded_backend();
    let app = app(backend.clone());
    get_json(&app, LEDGER_URI).await;

    let (status, body) = post_json(
        &app,
        "/api/floors/ground/parties/42/payments/request",
        json!({ "orderId": 500, "mode": "OFFICIAL" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flow"]["state"], "capturing");
    assert_eq!(body["flow"]["receivedSoFar"].as_f64(), Some(3000.0));

    let (status, body) = post_json(
        &app,
        "/api/floors/ground/parties/42/payments/submit",
        json!({ "amount": 6000, "date": "2024-06-15" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("exceeds"));
    assert_eq!(backend.receipt_calls(), 0);

    let (status, body) = post_json(
        &app,
        "/api/floors/ground/parties/42/payments/submit",
        json!({ "amount": 2000, "date": "2024-06-15" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settlement"]["ledgerRefreshed"], true);
    assert_eq!(body["settlement"]["payment"]["receivedAmount"].as_f64(), Some(5000.0));
    assert_eq!(body["session"]["flow"]["state"], "idle");
    assert_eq!(backend.receipt_calls(), 1);
    assert_eq!(backend.payment_list_calls(Floor::Ground), 2);
}

#[tokio::test]
async fn request_before_floor_loads_is_blocked() {
    let app = app(seeded_backend());

    let (status, body) = post_json(
        &app,
        "/api/floors/first/parties/42/payments/request",
        json!({ "orderId": 500, "mode": "OFFICIAL" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flow"]["state"], "blocked");

    let (_, body) = post_json(&app, "/api/floors/first/parties/42/payments/dismiss", json!({})).await;
    assert_eq!(body["flow"]["state"], "idle");
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let app = app(seeded_backend());

    let (status, _) = get_json(
        &app,
        "/api/floors/basement/parties/42/ledger?startDate=2024-01-01&endDate=2024-12-31",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get_json(
        &app,
        "/api/floors/ground/parties/42/ledger?startDate=2025-01-01&endDate=2024-01-01",
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = post_json(
        &app,
        "/api/floors/ground/parties/42/payments/request",
        json!({ "orderId": 0, "mode": "OFFICIAL" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn pdf_is_relayed_byte_for_byte() {
    let pdf = b"%PDF-1.4\n\xE2\xE3\xCF\xD3\x00\xFFbinary".to_vec();
    let backend = seeded_backend();
    backend.set_pdf(pdf.clone());
    let app = app(backend);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/floors/ground/parties/42/ledger/pdf?startDate=2024-04-01&endDate=2025-03-31")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"ledger-42-2024-04-01-2025-03-31.pdf\""
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body.to_vec(), pdf);
}

#[tokio::test]
async fn dashboard_load_fills_rows_and_totals() {
    let backend = FakeBackend::new();
    backend.set_parties(vec![party(1, "Asha Traders"), party(2, "Bharat Steel")]);
    backend.set_ledger(ledger_totals(1, 1_000, 500, 700));
    backend.fail_ledger(2, "ledger unavailable");
    let app = app(backend);

    let (status, body) = post_json(
        &app,
        "/api/dashboard/ledgers",
        json!({ "startDate": "2024-04-01", "endDate": "2025-03-31" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["parties"], 2);

    let board = loop {
        let (_, board) = get_json(&app, "/api/dashboard/ledgers").await;
        if board["totals"]["pending"] == 0 {
            break board;
        }
        tokio::task::yield_now().await;
    };

    assert_eq!(board["rows"][0]["loading"], false);
    assert_eq!(board["rows"][0]["error"], false);
    assert_eq!(board["rows"][1]["error"], true);
    assert_eq!(board["rows"][1]["errorMessage"], "ledger unavailable");
    assert_eq!(board["totals"]["totalRemainingAmount"].as_f64(), Some(800.0));
    assert_eq!(board["totals"]["provisional"], false);

    let (status, _) = post_json(&app, "/api/dashboard/ledgers/2/retry", json!({})).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = post_json(&app, "/api/dashboard/ledgers/99/retry", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn disconnected_submit_still_settles() {
    let backend = seeded_backend();
    let app = app(backend.clone());
    get_json(&app, LEDGER_URI).await;
    post_json(
        &app,
        "/api/floors/ground/parties/42/payments/request",
        json!({ "orderId": 500, "mode": "OFFICIAL" }),
    )
    .await;

    backend.set_ledger(ledger_with_order(42, 500, (8_000, 5_000), Some((2_000, 2_000))));
    let gate = backend.gate_payments(Floor::Ground);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        post_json(
            &app,
            "/api/floors/ground/parties/42/payments/submit",
            json!({ "amount": 2000, "date": "2024-06-15" }),
        ),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(backend.receipt_calls(), 1);

    gate.notify_one();

    // Waits on the session until the detached submission has settled.
    let (status, body) = post_json(
        &app,
        "/api/floors/ground/parties/42/payments/request",
        json!({ "orderId": 500, "mode": "OFFICIAL" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["flow"]["state"], "capturing");
    assert_eq!(body["flow"]["receivedSoFar"].as_f64(), Some(5000.0));
    assert_eq!(body["ledger"]["data"]["totalReceivedAmount"].as_f64(), Some(7000.0));
    assert_eq!(backend.payment_list_calls(Floor::Ground), 2);
}

#[tokio::test]
async fn closed_ledger_drops_its_in_flight_load() {
    let backend = seeded_backend();
    let gate = backend.gate_ledger(42, range("2024-04-01", "2025-03-31"));
    let app = app(backend.clone());

    let pending = tokio::spawn({
        let app = app.clone();
        async move { get_json(&app, LEDGER_URI).await }
    });
    while backend.ledger_calls(42) < 1 {
        tokio::task::yield_now().await;
    }

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(SESSION_URI)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Opens a fresh session for the same party.
    let (_, body) = post_json(&app, "/api/floors/ground/parties/42/payments/dismiss", json!({})).await;
    assert_eq!(body["ledger"]["state"], "idle");

    gate.notify_one();
    let (status, _) = pending.await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (_, body) = post_json(&app, "/api/floors/ground/parties/42/payments/dismiss", json!({})).await;
    assert_eq!(body["ledger"]["state"], "idle");
    assert_eq!(body["range"], Value::Null);
}

#[tokio::test]
async fn closing_an_unknown_ledger_is_not_found() {
    let app = app(seeded_backend());

    let (status, _) = send(
        &app,
        Request::builder()
            .method("DELETE")
            .uri(SESSION_URI)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
