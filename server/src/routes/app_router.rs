use axum::{
    extract::Request,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use http::HeaderName;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::ServerState;

use super::{inbox, inventory, monitoring};

const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct AppRouter;

impl AppRouter {
    pub fn create(state: ServerState) -> Router {
        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

        let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            tracing::info_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        });

        Router::new()
            .route("/", get(|| async { "Inbox assistant server" }))
            .route("/monitoring", get(monitoring::active))
            .route("/monitoring/:user_id", get(monitoring::status))
            .route("/monitoring/:user_id/start", post(monitoring::start))
            .route("/monitoring/:user_id/stop", post(monitoring::stop))
            .route(
                "/inventory/:user_id/test-matching",
                post(inventory::test_matching),
            )
            .route("/inventory/:user_id/import", post(inventory::import))
            .route(
                "/inventory/:user_id",
                get(inventory::list).post(inventory::add),
            )
            .route(
                "/inventory/:user_id/items/:item_id",
                put(inventory::update).delete(inventory::delete),
            )
            .route(
                "/inventory/:user_id/duplicate-threshold",
                post(inventory::set_duplicate_threshold),
            )
            .route("/drafts/:user_id", get(inbox::recent_drafts))
            .route("/filtered/:user_id", get(inbox::filtered_emails))
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(trace_layer)
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
            .layer(CorsLayer::permissive())
            .with_state(state)
            .fallback(handler_404)
    }
}

pub async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route does not exist")
}
