use std::sync::Arc;

use axum::http::header::ACCESS_CONTROL_REQUEST_METHOD;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use northwind_core::config::CorsConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CorsDecision {
    Allowed,
    Rejected,
}

/// Named cross-origin policy. Origins match after trimming a trailing `/`
/// and lower-casing; methods match case-insensitively.
#[derive(Clone, Debug)]
pub struct CorsPolicy {
    origins: Arc<Vec<String>>,
    methods: Vec<Method>,
    headers: Vec<HeaderName>,
}

fn normalize_origin(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// The method a preflight asks about, or the request's own method.
fn requested_method(parts: &Parts) -> &str {
    if parts.method == Method::OPTIONS {
        if let Some(requested) = parts
            .headers
            .get(ACCESS_CONTROL_REQUEST_METHOD)
            .and_then(|value| value.to_str().ok())
        {
            return requested;
        }
    }
    parts.method.as_str()
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let origins = config.allowed_origins.iter().map(|origin| normalize_origin(origin)).collect();
        let mut methods = Vec::new();
        for method in &config.allowed_methods {
            if let Ok(method) = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()) {
                if !methods.contains(&method) {
                    methods.push(method);
                }
            }
        }
        let headers = config
            .allowed_headers
            .iter()
            .filter_map(|header| HeaderName::from_bytes(header.trim().as_bytes()).ok())
            .collect();

        Self { origins: Arc::new(origins), methods, headers }
    }

    pub fn evaluate_origin(&self, origin: &str) -> bool {
        let origin = normalize_origin(origin);
        self.origins.iter().any(|allowed| *allowed == origin)
    }

    pub fn evaluate(&self, origin: &str, method: &str) -> CorsDecision {
        let method_allowed =
            self.methods.iter().any(|allowed| allowed.as_str().eq_ignore_ascii_case(method.trim()));
        if self.evaluate_origin(origin) && method_allowed {
            CorsDecision::Allowed
        } else {
            CorsDecision::Rejected
        }
    }

    pub fn layer(&self) -> CorsLayer {
        let policy = self.clone();
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, parts: &Parts| {
                let Ok(origin) = origin.to_str() else {
                    return false;
                };
                policy.evaluate(origin, requested_method(parts)) == CorsDecision::Allowed
            }))
            .allow_methods(self.methods.clone())
            .allow_headers(self.headers.clone())
    }
}
