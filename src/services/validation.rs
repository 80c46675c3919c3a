use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

use crate::error::{ValidationFailure, ValidationResult};
use crate::models::complaint::ComplaintBase;
use crate::models::schema::{ComplaintTypeSchema, FieldSpec, FieldType};
use crate::services::schema::resolve_schema;

/// Required textareas need at least this many characters.
pub const TEXTAREA_MIN_LENGTH: usize = 10;

/// Customer names need at least this many characters.
pub const CUSTOMER_NAME_MIN_LENGTH: usize = 2;

/// Key used for the attachment requirement in a `ValidationResult`.
pub const ATTACHMENTS_FIELD: &str = "attachments";

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"];

// Render an entered value as text. Null counts as absent.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        other => Some(other.to_string()),
    }
}

fn parse_number(value: &Value, text: &str) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        _ => text.parse::<f64>().ok().filter(|number| number.is_finite()),
    }
}

fn is_datetime(text: &str) -> bool {
    DATETIME_FORMATS
        .iter()
        .any(|format| NaiveDateTime::parse_from_str(text, format).is_ok())
}

// First failure for one field, if any.
fn check_field(field: &FieldSpec, value: Option<&Value>) -> Option<ValidationFailure> {
    let name = field.name.to_string();
    let text = value.and_then(value_text);
    let trimmed = text.as_deref().map(str::trim).unwrap_or("");

    if trimmed.is_empty() {
        return field
            .required
            .then_some(ValidationFailure::MissingField { field: name });
    }

    match field.field_type {
        FieldType::Textarea => {
            if field.required && trimmed.chars().count() < TEXTAREA_MIN_LENGTH {
                return Some(ValidationFailure::TooShort {
                    field: name,
                    min_length: TEXTAREA_MIN_LENGTH,
                });
            }
        }
        FieldType::Number => {
            let Some(number) = value.and_then(|value| parse_number(value, trimmed)) else {
                return Some(ValidationFailure::InvalidFormat { field: name });
            };
            if let Some(min) = field.min {
                if number < min {
                    return Some(ValidationFailure::BelowMinimum { field: name, min });
                }
            }
        }
        FieldType::Select => {
            if !field.options.iter().any(|option| *option == trimmed) {
                return Some(ValidationFailure::InvalidOption { field: name });
            }
        }
        FieldType::Date => {
            if NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").is_err() {
                return Some(ValidationFailure::InvalidFormat { field: name });
            }
        }
        FieldType::Datetime => {
            if !is_datetime(trimmed) {
                return Some(ValidationFailure::InvalidFormat { field: name });
            }
        }
        FieldType::Text => {}
    }

    None
}

/// Validates dynamic field values and the attachment requirement against a schema.
///
/// Every field is checked so the caller can mark all invalid controls at once;
/// each field reports only its first failure. Values for names outside the
/// schema are ignored.
pub fn validate(
    schema: &ComplaintTypeSchema,
    values: &HashMap<String, Value>,
    attachment_count: usize,
) -> ValidationResult {
    let mut result = ValidationResult::new();

    for field in schema.fields {
        if let Some(failure) = check_field(field, values.get(field.name)) {
            result.add(field.name, failure);
        }
    }

    if schema.image_required && attachment_count == 0 {
        result.add(ATTACHMENTS_FIELD, ValidationFailure::MissingAttachment);
    }

    if !result.is_valid() {
        debug!(
            "Complaint type {} has {} invalid field(s)",
            schema.complaint_type,
            result.len()
        );
    }

    result
}

fn is_phone(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

/// Validates the fixed customer, branch and type fields.
pub fn validate_base(base: &ComplaintBase) -> ValidationResult {
    let mut result = ValidationResult::new();

    let name = base.customer_name.trim();
    if name.is_empty() {
        result.add(
            "customerName",
            ValidationFailure::MissingField {
                field: "customerName".to_string(),
            },
        );
    } else if name.chars().count() < CUSTOMER_NAME_MIN_LENGTH {
        result.add(
            "customerName",
            ValidationFailure::TooShort {
                field: "customerName".to_string(),
                min_length: CUSTOMER_NAME_MIN_LENGTH,
            },
        );
    }

    if let Some(phone) = base.customer_phone.as_deref().map(str::trim) {
        if !phone.is_empty() && !is_phone(phone) {
            result.add(
                "customerPhone",
                ValidationFailure::InvalidFormat {
                    field: "customerPhone".to_string(),
                },
            );
        }
    }

    if base.branch_id.trim().is_empty() {
        result.add(
            "branchId",
            ValidationFailure::MissingField {
                field: "branchId".to_string(),
            },
        );
    }

    let complaint_type = base.complaint_type.trim();
    if complaint_type.is_empty() {
        result.add(
            "complaintType",
            ValidationFailure::MissingField {
                field: "complaintType".to_string(),
            },
        );
    } else if resolve_schema(complaint_type).is_none() {
        result.add(
            "complaintType",
            ValidationFailure::InvalidOption {
                field: "complaintType".to_string(),
            },
        );
    }

    result
}
