use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::Router;
use tera::{Context, Tera};
use thiserror::Error;
use utoipa::OpenApi;

use northwind_core::config::AppConfig;
use northwind_core::domain::customer::{Customer, CustomerInput};

use crate::errors::{ErrorBody, ErrorDetail};
use crate::health::{HealthCheck, HealthResponse};
use crate::state::AppState;

const SWAGGER_TEMPLATE: &str = "swagger/index.html";

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::customers::list_customers,
        crate::customers::get_customer,
        crate::customers::create_customer,
        crate::customers::update_customer,
        crate::customers::patch_customer,
        crate::customers::delete_customer,
        crate::health::health,
    ),
    components(schemas(Customer, CustomerInput, ErrorBody, ErrorDetail, HealthResponse, HealthCheck)),
    tags(
        (name = "customers", description = "Northwind customers"),
        (name = "health", description = "Readiness probe"),
    )
)]
pub struct ApiDoc;

#[derive(Debug, Error)]
pub enum DocsError {
    #[error("could not serialize OpenAPI document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("could not render Swagger UI: {0}")]
    Template(#[from] tera::Error),
}

/// OpenAPI document and UI page, built once at startup.
#[derive(Debug)]
pub struct PublishedDocs {
    pub json_path: String,
    pub document: String,
    pub ui_html: String,
}

impl PublishedDocs {
    pub fn build(config: &AppConfig) -> Result<Self, DocsError> {
        let mut openapi = ApiDoc::openapi();
        openapi.info.title = config.docs.title.clone();
        openapi.info.version = config.docs.version.clone();
        let document = openapi.to_pretty_json()?;

        let json_path = config.swagger_json_path();
        let label = format!(
            "{} Version {}",
            config.docs.title,
            config.docs.version.trim_start_matches(['v', 'V'])
        );

        let mut tera = Tera::default();
        tera.add_raw_template(
            SWAGGER_TEMPLATE,
            include_str!("../../../templates/swagger/index.html"),
        )?;

        let mut context = Context::new();
        context.insert("title", &config.docs.title);
        context.insert("document_url", &serde_json::to_string(&json_path)?);
        context.insert("label", &serde_json::to_string(&label)?);
        context.insert("submit_methods", &serde_json::to_string(&config.docs.submit_methods)?);
        let ui_html = tera.render(SWAGGER_TEMPLATE, &context)?;

        Ok(Self { json_path, document, ui_html })
    }
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(&state.docs.json_path, get(swagger_json))
        .route("/swagger", get(swagger_ui))
        .route("/swagger/index.html", get(swagger_ui))
}

async fn swagger_json(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "application/json; charset=utf-8")], state.docs.document.clone())
}

async fn swagger_ui(State(state): State<AppState>) -> Html<String> {
    Html(state.docs.ui_html.clone())
}
