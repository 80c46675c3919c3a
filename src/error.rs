use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message shown when a submission fails without a structured backend reason.
pub const GENERIC_SUBMIT_FAILURE: &str = "Failed to submit complaint. Please try again.";

/// One field-scoped validation failure. Always recoverable by user correction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("{field} is required")]
    MissingField { field: String },
    #[error("{field} must be at least {min_length} characters")]
    TooShort { field: String, min_length: usize },
    #[error("{field} must be at least {min}")]
    BelowMinimum { field: String, min: f64 },
    #[error("{field} is not one of the allowed options")]
    InvalidOption { field: String },
    #[error("{field} has an invalid format")]
    InvalidFormat { field: String },
    #[error("at least one image is required for this complaint type")]
    MissingAttachment,
}

/// Field-keyed validation failures, at most one per field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    errors: BTreeMap<String, ValidationFailure>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure unless the field already has one.
    pub fn add(&mut self, field: impl Into<String>, failure: ValidationFailure) {
        self.errors.entry(field.into()).or_insert(failure);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        for (field, failure) in other.errors {
            self.add(field, failure);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&ValidationFailure> {
        self.errors.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ValidationFailure)> {
        self.errors.iter()
    }

    /// Field name to display message, for annotating every invalid control at once.
    pub fn messages(&self) -> BTreeMap<String, String> {
        self.errors
            .iter()
            .map(|(field, failure)| (field.clone(), failure.to_string()))
            .collect()
    }
}

/// Static schema table consistency problems.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("{complaint_type}: field {field} is declared more than once")]
    DuplicateField {
        complaint_type: String,
        field: String,
    },
    #[error("{complaint_type}: field {field} collides with a base submission field")]
    ReservedName {
        complaint_type: String,
        field: String,
    },
    #[error("{complaint_type}: field {field} must have options if and only if it is a select")]
    OptionsMismatch {
        complaint_type: String,
        field: String,
    },
    #[error("{complaint_type}: field {field} has numeric constraints but is not a number")]
    NumericConstraintOnNonNumber {
        complaint_type: String,
        field: String,
    },
}

/// Per-file attachment upload failures.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{file_name} is not an image file")]
    NotAnImage { file_name: String },
    #[error("{file_name} is too large ({size} bytes, limit {limit} bytes)")]
    TooLarge {
        file_name: String,
        size: usize,
        limit: usize,
    },
    #[error("at most {limit} images are allowed")]
    TooManyAttachments { limit: usize },
    #[error("failed to upload {file_name}: {message}")]
    Storage { file_name: String, message: String },
}

/// Credential store failures.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("credential store contains invalid data: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("credential store lock poisoned")]
    Poisoned,
}

/// Failures talking to the complaint backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("not signed in")]
    NotAuthenticated,
    #[error("unexpected backend response: {0}")]
    Decode(String),
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}

impl ApiError {
    /// Text suitable for a user-facing notification.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::NotAuthenticated => "Please sign in again.".to_string(),
            _ => GENERIC_SUBMIT_FAILURE.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::NotAuthenticated | ApiError::Rejected { status: 401, .. }
        )
    }
}

/// Error payload the backend sends with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl BackendErrorBody {
    pub fn display_message(&self) -> String {
        if let Some(error) = &self.error {
            return format!("Error: {}", error);
        }
        if let Some(details) = &self.details {
            let details = match details {
                serde_json::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            return format!("Validation Error: {}", details);
        }
        self.message
            .clone()
            .unwrap_or_else(|| GENERIC_SUBMIT_FAILURE.to_string())
    }
}

/// Intake flow failures.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("submission has {} invalid field(s)", .0.len())]
    Invalid(ValidationResult),
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error("complaint was already submitted")]
    AlreadySubmitted,
    #[error("no submission is in flight")]
    NotSubmitting,
    #[error("no schema for complaint type {0:?}")]
    NoSchema(String),
    #[error(transparent)]
    Attachments(#[from] UploadError),
    #[error(transparent)]
    Backend(#[from] ApiError),
}

/// JSON error body returned by the front-end service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            field_errors: BTreeMap::new(),
        }
    }

    pub fn validation(result: &ValidationResult) -> Self {
        Self {
            error: "Validation failed".to_string(),
            field_errors: result.messages(),
        }
    }
}
