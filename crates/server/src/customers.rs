use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::info;

use northwind_core::domain::customer::{Customer, CustomerFilter, CustomerId, CustomerInput};
use northwind_core::ApplicationError;

use crate::errors::{ApiError, ErrorBody};
use crate::extract::{ApiPath, ApiQuery};
use crate::formatters::{CustomerBody, Negotiated, ResponseFormat};
use crate::state::AppState;

const ENTITY: &str = "customer";

pub fn router() -> Router<AppState> {
    Router::new().route("/customers", get(list_customers).post(create_customer)).route(
        "/customers/{id}",
        get(get_customer).put(update_customer).patch(patch_customer).delete(delete_customer),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct ListCustomersQuery {
    pub country: Option<String>,
}

fn location(id: &CustomerId) -> String {
    format!("/customers/{id}")
}

#[utoipa::path(
    get,
    path = "/customers",
    params(("country" = Option<String>, Query, description = "Only customers in this country")),
    responses(
        (status = 200, description = "All customers, ordered by id", body = Vec<Customer>),
    ),
    tag = "customers"
)]
pub async fn list_customers(
    State(state): State<AppState>,
    ResponseFormat(format): ResponseFormat,
    ApiQuery(query): ApiQuery<ListCustomersQuery>,
) -> Result<Negotiated<Vec<Customer>>, ApiError> {
    let filter =
        CustomerFilter { country: query.country.filter(|country| !country.trim().is_empty()) };
    let customers = state.customers.list(&filter).await?;
    Ok(Negotiated::ok(format, customers))
}

#[utoipa::path(
    get,
    path = "/customers/{id}",
    params(("id" = String, Path, description = "Customer identifier, e.g. ALFKI")),
    responses(
        (status = 200, description = "Customer found", body = Customer),
        (status = 404, description = "Not found", body = ErrorBody),
    ),
    tag = "customers"
)]
pub async fn get_customer(
    State(state): State<AppState>,
    ResponseFormat(format): ResponseFormat,
    ApiPath(id): ApiPath<String>,
) -> Result<Negotiated<Customer>, ApiError> {
    let id = CustomerId(id);
    let customer = state
        .customers
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApplicationError::not_found(ENTITY, id.as_str()))?;
    Ok(Negotiated::ok(format, customer))
}

#[utoipa::path(
    post,
    path = "/customers",
    request_body = CustomerInput,
    responses(
        (status = 201, description = "Customer created", body = Customer),
        (status = 400, description = "Malformed body or failed validation", body = ErrorBody),
        (status = 415, description = "Unsupported content type", body = ErrorBody),
    ),
    tag = "customers"
)]
pub async fn create_customer(
    State(state): State<AppState>,
    ResponseFormat(format): ResponseFormat,
    CustomerBody(input): CustomerBody,
) -> Result<Negotiated<Customer>, ApiError> {
    let new_customer = input.into_new_customer()?;
    let created = state.customers.create(new_customer).await?;

    info!(
        event_name = "customers.created",
        customer_id = %created.id,
        "customer created"
    );
    let location = location(&created.id);
    Ok(Negotiated::created(format, created, location))
}

#[utoipa::path(
    put,
    path = "/customers/{id}",
    params(("id" = String, Path, description = "Customer identifier")),
    request_body = CustomerInput,
    responses(
        (status = 200, description = "Customer replaced", body = Customer),
        (status = 400, description = "Identifier mismatch or failed validation", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
    ),
    tag = "customers"
)]
pub async fn update_customer(
    State(state): State<AppState>,
    ResponseFormat(format): ResponseFormat,
    ApiPath(id): ApiPath<String>,
    CustomerBody(input): CustomerBody,
) -> Result<Negotiated<Customer>, ApiError> {
    let id = CustomerId(id);
    let profile = input.into_replacement(&id)?;
    let updated = state
        .customers
        .update(&id, profile)
        .await?
        .ok_or_else(|| ApplicationError::not_found(ENTITY, id.as_str()))?;

    info!(event_name = "customers.updated", customer_id = %id, "customer replaced");
    Ok(Negotiated::ok(format, updated))
}

#[utoipa::path(
    patch,
    path = "/customers/{id}",
    params(("id" = String, Path, description = "Customer identifier")),
    request_body = CustomerInput,
    responses(
        (status = 200, description = "Customer updated", body = Customer),
        (status = 400, description = "Identifier mismatch or failed validation", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody),
    ),
    tag = "customers"
)]
pub async fn patch_customer(
    State(state): State<AppState>,
    ResponseFormat(format): ResponseFormat,
    ApiPath(id): ApiPath<String>,
    CustomerBody(input): CustomerBody,
) -> Result<Negotiated<Customer>, ApiError> {
    let id = CustomerId(id);
    let patch = input.into_patch(&id)?;
    let patched = state
        .customers
        .patch(&id, patch)
        .await?
        .ok_or_else(|| ApplicationError::not_found(ENTITY, id.as_str()))?;

    info!(event_name = "customers.patched", customer_id = %id, "customer updated");
    Ok(Negotiated::ok(format, patched))
}

#[utoipa::path(
    delete,
    path = "/customers/{id}",
    params(("id" = String, Path, description = "Customer identifier")),
    responses(
        (status = 204, description = "Customer deleted"),
        (status = 404, description = "Not found", body = ErrorBody),
    ),
    tag = "customers"
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<StatusCode, ApiError> {
    let id = CustomerId(id);
    if !state.customers.delete(&id).await? {
        return Err(ApplicationError::not_found(ENTITY, id.as_str()).into());
    }

    info!(event_name = "customers.deleted", customer_id = %id, "customer deleted");
    Ok(StatusCode::NO_CONTENT)
}
