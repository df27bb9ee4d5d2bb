//! Request pipeline, outermost to innermost:
//! request id and tracing, error rendering, panic capture, authorization,
//! CORS, then routing.

use std::time::Duration;

use axum::extract::Request;
use axum::http::{Method, Uri};
use axum::middleware::{from_fn, from_fn_with_state, Next};
use axum::response::Response;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::cors::CorsPolicy;
use crate::errors::{self, ApiError};
use crate::state::AppState;
use crate::{customers, docs, health};

pub fn app(state: AppState) -> Router {
    let cors = CorsPolicy::from_config(&state.config.cors);

    Router::new()
        .merge(customers::router())
        .merge(docs::router(&state))
        .merge(health::router())
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(cors.layer())
        .layer(from_fn(authorize))
        .layer(CatchPanicLayer::custom(errors::panic_response))
        .layer(from_fn_with_state(state.clone(), errors::render_errors))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(request_span)
                        .on_response(log_response),
                )
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

/// Authorization stage. No scheme is configured, so every request passes.
async fn authorize(request: Request, next: Next) -> Response {
    next.run(request).await
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route matches `{}`", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("`{method}` is not supported on `{}`", uri.path()))
}

fn request_span(request: &Request) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http.request",
        method = %request.method(),
        path = %request.uri().path(),
        correlation_id = %request_id,
    )
}

fn log_response(response: &Response, latency: Duration, _span: &Span) {
    tracing::info!(
        event_name = "http.request",
        status = response.status().as_u16(),
        latency_ms = latency.as_millis() as u64,
        "request completed"
    );
}
