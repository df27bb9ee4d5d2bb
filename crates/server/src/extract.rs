//! `Path` and `Query` wrappers whose rejections render like any other
//! [`ApiError`], in the negotiated format.

use axum::extract::{FromRequestParts, Path, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;

use crate::errors::ApiError;

#[derive(Debug)]
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRequestParts;
    use axum::http::Request;

    use super::ApiQuery;
    use crate::customers::ListCustomersQuery;
    use crate::errors::ApiError;

    #[tokio::test]
    async fn query_rejections_become_bad_requests() {
        let (mut parts, _) = Request::builder()
            .uri("/customers?country=a&country=b")
            .body(())
            .expect("request")
            .into_parts();

        let rejection = ApiQuery::<ListCustomersQuery>::from_request_parts(&mut parts, &())
            .await
            .expect_err("duplicate field");

        match rejection {
            ApiError::BadRequest(message) => assert!(message.contains("country"), "{message}"),
            other => panic!("expected bad request, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn well_formed_queries_pass_through() {
        let (mut parts, _) =
            Request::builder().uri("/customers?country=UK").body(()).expect("request").into_parts();

        let ApiQuery(query) = ApiQuery::<ListCustomersQuery>::from_request_parts(&mut parts, &())
            .await
            .expect("query");

        assert_eq!(query.country.as_deref(), Some("UK"));
    }
}
