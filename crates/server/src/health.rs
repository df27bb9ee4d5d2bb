use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use northwind_db::DbPool;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthCheck {
    pub status: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub checked_at: String,
}

impl HealthCheck {
    fn new(status: &str, detail: impl Into<String>) -> Self {
        Self { status: status.to_string(), detail: detail.into() }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are ready", body = HealthResponse),
        (status = 503, description = "Database is unreachable", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(state.db_pool.as_ref()).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" }.to_string(),
        service: HealthCheck {
            status: "ready".to_string(),
            detail: format!("{} ({})", state.config.docs.title, state.config.environment.as_str()),
        },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: Option<&DbPool>) -> HealthCheck {
    let Some(pool) = pool else {
        return HealthCheck::new("ready", "no database pool attached");
    };

    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck::new("ready", "database query succeeded"),
        Err(error) => HealthCheck::new("degraded", format!("database query failed: {error}")),
    }
}
