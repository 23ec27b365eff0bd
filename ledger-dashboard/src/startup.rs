use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    app::health_check,
    dashboard::{ledger_board, load_ledgers, retry_party},
    ledger::{close_party_ledger, party_ledger, party_ledger_pdf},
    metrics::metrics,
    parties::list_parties,
    payments::{dismiss, index_status, rebuild_index, request_payment, submit_payment},
};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/parties", get(list_parties))
        .route("/dashboard/ledgers", get(ledger_board).post(load_ledgers))
        .route("/dashboard/ledgers/:party_id/retry", post(retry_party))
        .route(
            "/floors/:floor/parties/:party_id/ledger",
            get(party_ledger).delete(close_party_ledger),
        )
        .route(
            "/floors/:floor/parties/:party_id/ledger/pdf",
            get(party_ledger_pdf),
        )
        .route(
            "/floors/:floor/payments/index",
            get(index_status).post(rebuild_index),
        )
        .route(
            "/floors/:floor/parties/:party_id/payments/request",
            post(request_payment),
        )
        .route(
            "/floors/:floor/parties/:party_id/payments/submit",
            post(submit_payment),
        )
        .route(
            "/floors/:floor/parties/:party_id/payments/dismiss",
            post(dismiss),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        // Route-level so the matched path template is visible to the middleware
        .route_layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
