//! Content negotiation for customer payloads.
//!
//! Output formatters are consulted in registration order: JSON first, then the
//! two XML serializers. Request bodies are read according to `Content-Type`.

pub mod xml;

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::info;

use northwind_core::config::XmlFlavor;
use northwind_core::domain::customer::{Customer, CustomerInput};

use crate::errors::ApiError;
use crate::state::AppState;

pub use xml::XmlError;

const JSON_MEDIA_TYPES: &[&str] = &["application/json", "text/json"];
const XML_MEDIA_TYPES: &[&str] = &["application/xml", "text/xml"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Xml(XmlFlavor),
}

impl BodyFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json; charset=utf-8",
            Self::Xml(_) => "application/xml; charset=utf-8",
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct OutputFormatter {
    pub name: &'static str,
    pub media_types: &'static [&'static str],
    pub format: BodyFormat,
}

pub const OUTPUT_FORMATTERS: [OutputFormatter; 3] = [
    OutputFormatter { name: "json", media_types: JSON_MEDIA_TYPES, format: BodyFormat::Json },
    OutputFormatter {
        name: "xml-contract",
        media_types: XML_MEDIA_TYPES,
        format: BodyFormat::Xml(XmlFlavor::Contract),
    },
    OutputFormatter {
        name: "xml-reflection",
        media_types: XML_MEDIA_TYPES,
        format: BodyFormat::Xml(XmlFlavor::Reflection),
    },
];

pub fn log_registered(preferred_xml: XmlFlavor) {
    for (position, formatter) in OUTPUT_FORMATTERS.iter().enumerate() {
        info!(
            event_name = "system.bootstrap.formatter_registered",
            correlation_id = "bootstrap",
            position,
            formatter = formatter.name,
            media_types = %formatter.media_types.join(", "),
            content_type = formatter.format.content_type(),
            "output formatter registered"
        );
    }
    info!(
        event_name = "system.bootstrap.formatters_ready",
        correlation_id = "bootstrap",
        preferred_xml = preferred_xml.as_str(),
        "content negotiation configured"
    );
}

struct MediaRange<'a> {
    essence: String,
    flavor: Option<&'a str>,
    quality: f32,
}

fn parse_media_range(raw: &str) -> Option<MediaRange<'_>> {
    let mut parts = raw.split(';');
    let essence = parts.next()?.trim().to_ascii_lowercase();
    if essence.is_empty() {
        return None;
    }

    let mut flavor = None;
    let mut quality = 1.0;
    for parameter in parts {
        let Some((key, value)) = parameter.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "q" => quality = value.parse::<f32>().unwrap_or(0.0),
            "flavor" => flavor = Some(value),
            _ => {}
        }
    }

    Some(MediaRange { essence, flavor, quality })
}

fn format_for_range(range: &MediaRange<'_>, preferred_xml: XmlFlavor) -> Option<BodyFormat> {
    let essence = range.essence.as_str();
    if JSON_MEDIA_TYPES.contains(&essence) || essence.ends_with("+json") {
        return Some(BodyFormat::Json);
    }
    if XML_MEDIA_TYPES.contains(&essence) || essence.ends_with("+xml") {
        let flavor = match range.flavor.map(str::parse::<XmlFlavor>) {
            Some(Ok(flavor)) => flavor,
            Some(Err(_)) => return None,
            None => preferred_xml,
        };
        return Some(BodyFormat::Xml(flavor));
    }
    match essence {
        "*/*" | "application/*" | "text/*" => Some(BodyFormat::Json),
        _ => None,
    }
}

/// Picks the response format for an `Accept` header. Ranges are tried by
/// descending quality; ties keep header order. Anything unusable means JSON.
pub fn negotiate(accept: Option<&str>, preferred_xml: XmlFlavor) -> BodyFormat {
    let Some(accept) = accept else {
        return BodyFormat::Json;
    };

    let mut ranges: Vec<MediaRange<'_>> =
        accept.split(',').filter_map(parse_media_range).filter(|r| r.quality > 0.0).collect();
    ranges.sort_by(|a, b| b.quality.total_cmp(&a.quality));

    ranges
        .iter()
        .find_map(|range| format_for_range(range, preferred_xml))
        .unwrap_or(BodyFormat::Json)
}

pub fn negotiate_headers(headers: &HeaderMap, preferred_xml: XmlFlavor) -> BodyFormat {
    negotiate(headers.get(ACCEPT).and_then(|value| value.to_str().ok()), preferred_xml)
}

/// Response format chosen from the request's `Accept` header.
#[derive(Clone, Copy, Debug)]
pub struct ResponseFormat(pub BodyFormat);

impl FromRequestParts<AppState> for ResponseFormat {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(negotiate_headers(&parts.headers, state.preferred_xml())))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InputFormat {
    Json,
    Xml,
}

fn input_format(headers: &HeaderMap) -> Result<InputFormat, ApiError> {
    let Some(raw) = headers.get(CONTENT_TYPE) else {
        return Err(ApiError::UnsupportedMediaType("request has no content type".to_string()));
    };
    let raw = raw.to_str().map_err(|_| {
        ApiError::UnsupportedMediaType("content type is not valid ascii".to_string())
    })?;
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

    if JSON_MEDIA_TYPES.contains(&essence.as_str()) || essence.ends_with("+json") {
        Ok(InputFormat::Json)
    } else if XML_MEDIA_TYPES.contains(&essence.as_str()) || essence.ends_with("+xml") {
        Ok(InputFormat::Xml)
    } else {
        Err(ApiError::UnsupportedMediaType(format!("content type `{essence}` is not supported")))
    }
}

/// Customer body decoded from JSON or either XML flavor.
#[derive(Debug)]
pub struct CustomerBody(pub CustomerInput);

impl<S> FromRequest<S> for CustomerBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let format = input_format(request.headers())?;
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        let input = match format {
            InputFormat::Json => serde_json::from_slice::<CustomerInput>(&bytes)
                .map_err(|error| ApiError::BadRequest(format!("malformed JSON body: {error}")))?,
            InputFormat::Xml => xml::decode_customer(&bytes)
                .map_err(|error| ApiError::BadRequest(format!("malformed XML body: {error}")))?,
        };
        Ok(Self(input))
    }
}

/// A payload that can be written by every registered output formatter.
pub trait Representation: Serialize {
    fn to_xml(&self, flavor: XmlFlavor) -> Result<String, XmlError>;

    fn render(&self, format: BodyFormat) -> Result<Vec<u8>, String> {
        match format {
            BodyFormat::Json => serde_json::to_vec(self).map_err(|error| error.to_string()),
            BodyFormat::Xml(flavor) => {
                self.to_xml(flavor).map(String::into_bytes).map_err(|error| error.to_string())
            }
        }
    }
}

impl Representation for Customer {
    fn to_xml(&self, flavor: XmlFlavor) -> Result<String, XmlError> {
        xml::encode_customer(self, flavor)
    }
}

impl Representation for Vec<Customer> {
    fn to_xml(&self, flavor: XmlFlavor) -> Result<String, XmlError> {
        xml::encode_customers(self, flavor)
    }
}

/// Body rendered in the negotiated format, with an optional `Location`.
pub struct Negotiated<T> {
    format: BodyFormat,
    status: StatusCode,
    location: Option<String>,
    body: T,
}

impl<T> Negotiated<T> {
    pub fn ok(format: BodyFormat, body: T) -> Self {
        Self { format, status: StatusCode::OK, location: None, body }
    }

    pub fn created(format: BodyFormat, body: T, location: String) -> Self {
        Self { format, status: StatusCode::CREATED, location: Some(location), body }
    }

}

impl<T: Representation> IntoResponse for Negotiated<T> {
    fn into_response(self) -> Response {
        let bytes = match self.body.render(self.format) {
            Ok(bytes) => bytes,
            Err(error) => {
                return ApiError::Internal(format!("could not serialize response: {error}"))
                    .into_response()
            }
        };

        let mut response =
            (self.status, [(CONTENT_TYPE, self.format.content_type())], bytes).into_response();
        if let Some(location) = self.location.and_then(|l| HeaderValue::from_str(&l).ok()) {
            response.headers_mut().insert(LOCATION, location);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, HeaderValue};
    use northwind_core::config::XmlFlavor;

    use super::*;

    #[test]
    fn missing_or_wildcard_accept_selects_json() {
        assert_eq!(negotiate(None, XmlFlavor::Contract), BodyFormat::Json);
        assert_eq!(negotiate(Some("*/*"), XmlFlavor::Contract), BodyFormat::Json);
        assert_eq!(negotiate(Some("image/png"), XmlFlavor::Contract), BodyFormat::Json);
    }

    #[test]
    fn xml_accept_uses_configured_flavor_unless_parameter_overrides() {
        assert_eq!(
            negotiate(Some("application/xml"), XmlFlavor::Contract),
            BodyFormat::Xml(XmlFlavor::Contract)
        );
        assert_eq!(
            negotiate(Some("text/xml"), XmlFlavor::Reflection),
            BodyFormat::Xml(XmlFlavor::Reflection)
        );
        assert_eq!(
            negotiate(Some("application/xml; flavor=reflection"), XmlFlavor::Contract),
            BodyFormat::Xml(XmlFlavor::Reflection)
        );
    }

    #[test]
    fn quality_values_order_the_ranges() {
        assert_eq!(
            negotiate(Some("application/json;q=0.5, application/xml"), XmlFlavor::Contract),
            BodyFormat::Xml(XmlFlavor::Contract)
        );
        assert_eq!(
            negotiate(Some("application/xml;q=0, text/json"), XmlFlavor::Contract),
            BodyFormat::Json
        );
        assert_eq!(
            negotiate(Some("text/html, application/xml;q=0.9"), XmlFlavor::Contract),
            BodyFormat::Xml(XmlFlavor::Contract)
        );
    }

    #[test]
    fn registration_order_is_json_then_contract_then_reflection() {
        let names: Vec<&str> = OUTPUT_FORMATTERS.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["json", "xml-contract", "xml-reflection"]);
    }

    #[test]
    fn request_content_type_is_required_and_checked() {
        let mut headers = HeaderMap::new();
        assert!(matches!(input_format(&headers), Err(ApiError::UnsupportedMediaType(_))));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(matches!(input_format(&headers), Err(ApiError::UnsupportedMediaType(_))));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert_eq!(input_format(&headers).expect("json"), InputFormat::Json);

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/xml"));
        assert_eq!(input_format(&headers).expect("xml"), InputFormat::Xml);
    }
}
