use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

/// Field-level validation failures keyed by wire field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&rendered)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),
    #[error("identifier in body `{body}` does not match identifier in path `{path}`")]
    IdentifierMismatch { path: String, body: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, ValidationErrors};

    #[test]
    fn validation_errors_group_messages_by_field() {
        let mut errors = ValidationErrors::default();
        errors.add("CompanyName", "is required");
        errors.add("City", "must be at most 15 characters");
        errors.add("CompanyName", "must not be blank");

        assert_eq!(
            errors.to_string(),
            "City: must be at most 15 characters; CompanyName: is required, must not be blank"
        );
    }

    #[test]
    fn empty_validation_errors_are_ok() {
        assert!(ValidationErrors::default().into_result().is_ok());
    }

    #[test]
    fn not_found_message_names_entity_and_id() {
        let error = ApplicationError::not_found("customer", "ALFKI");
        assert_eq!(error.to_string(), "customer `ALFKI` was not found");
    }

    #[test]
    fn domain_errors_convert_into_application_errors() {
        let error = ApplicationError::from(DomainError::IdentifierMismatch {
            path: "ALFKI".to_string(),
            body: "ANATR".to_string(),
        });
        assert!(matches!(error, ApplicationError::Domain(DomainError::IdentifierMismatch { .. })));
    }
}
