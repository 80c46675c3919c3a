use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::SchemaError;
use crate::models::complaint::BASE_FIELD_NAMES;
use crate::models::schema::{ComplaintTypeSchema, FieldSpec, FieldType};

const PRODUCT_QUALITY_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("productName", "Product name / serial number *", FieldType::Text, true)
        .placeholder("Enter the product name or serial number"),
    FieldSpec::new("batchExpiryDate", "Production / expiry date", FieldType::Date, false),
    FieldSpec::new("productPurchaseDate", "Purchase date *", FieldType::Date, true),
    FieldSpec::new("issueDescription", "Issue description *", FieldType::Textarea, true)
        .placeholder("Describe the quality problem in detail"),
];

const SERVICE_ISSUE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("serviceType", "Service type *", FieldType::Select, true).options(&[
        "Delivery",
        "Checkout",
        "Help desk",
        "Customer service",
        "Other",
    ]),
    FieldSpec::new("incidentDateTime", "Incident date and time *", FieldType::Datetime, true),
    FieldSpec::new("employeeName", "Employee name / ID (if known)", FieldType::Text, false)
        .placeholder("Enter the employee name or ID"),
    FieldSpec::new("issueDescription", "Issue description *", FieldType::Textarea, true)
        .placeholder("Describe the service problem"),
];

const STAFF_BEHAVIOR_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("staffName", "Employee name / ID (if known)", FieldType::Text, false)
        .placeholder("Enter the employee name or ID"),
    FieldSpec::new("incidentDateTime", "Incident date and time *", FieldType::Datetime, true),
    FieldSpec::new("complaintDetails", "Complaint details *", FieldType::Textarea, true)
        .placeholder("Describe the behaviour"),
    FieldSpec::new("witnesses", "Witnesses (if any)", FieldType::Text, false)
        .placeholder("Names of any witnesses"),
];

const PRICING_DISPUTE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("productName", "Product name / serial number *", FieldType::Text, true)
        .placeholder("Enter the product name or serial number"),
    FieldSpec::new("receiptPrice", "Price on receipt *", FieldType::Number, true)
        .placeholder("0.00")
        .step(0.01),
    FieldSpec::new("expectedPrice", "Expected / advertised price *", FieldType::Number, true)
        .placeholder("0.00")
        .step(0.01),
    FieldSpec::new("incidentDateTime", "Date and time *", FieldType::Datetime, true),
    FieldSpec::new("proofOfOffer", "Proof of offer / discount", FieldType::Text, false)
        .placeholder("Describe the offer or discount"),
];

const CLEANLINESS_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("locationInStore", "Location in store *", FieldType::Select, true).options(&[
        "Restroom",
        "Aisle",
        "Counter",
        "Parking",
        "Entrance",
        "Other",
    ]),
    FieldSpec::new("incidentDateTime", "Date and time *", FieldType::Datetime, true),
    FieldSpec::new("issueDetails", "Issue details *", FieldType::Textarea, true)
        .placeholder("Describe the cleanliness problem"),
];

const WAITING_TIME_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("serviceType", "Service type *", FieldType::Select, true).options(&[
        "Billing",
        "Customer service",
        "Returns",
        "Help desk",
        "Other",
    ]),
    FieldSpec::new("incidentDateTime", "Date and time *", FieldType::Datetime, true),
    FieldSpec::new("waitingDuration", "Waiting time (minutes) *", FieldType::Number, true)
        .placeholder("30")
        .min(1.0),
    FieldSpec::new("issueDescription", "Issue description", FieldType::Textarea, false)
        .placeholder("Any further details about the wait"),
];

const OTHER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("issueDescription", "Issue description *", FieldType::Textarea, true)
        .placeholder("Please describe your issue in detail"),
];

static SCHEMAS: [ComplaintTypeSchema; 7] = [
    ComplaintTypeSchema {
        complaint_type: "product_quality",
        title: "Product quality issue",
        fields: PRODUCT_QUALITY_FIELDS,
        image_required: true,
        image_label: "Upload a photo of the damaged / expired product *",
    },
    ComplaintTypeSchema {
        complaint_type: "service_issue",
        title: "Service issue",
        fields: SERVICE_ISSUE_FIELDS,
        image_required: false,
        image_label: "Upload a photo (receipt, screenshot)",
    },
    ComplaintTypeSchema {
        complaint_type: "staff_behavior",
        title: "Staff behaviour",
        fields: STAFF_BEHAVIOR_FIELDS,
        image_required: false,
        image_label: "Upload a photo (any relevant evidence)",
    },
    ComplaintTypeSchema {
        complaint_type: "pricing_dispute",
        title: "Pricing dispute",
        fields: PRICING_DISPUTE_FIELDS,
        image_required: true,
        image_label: "Upload the receipt and price tag *",
    },
    ComplaintTypeSchema {
        complaint_type: "cleanliness",
        title: "Cleanliness / hygiene",
        fields: CLEANLINESS_FIELDS,
        image_required: true,
        image_label: "Upload a photo of the affected area *",
    },
    ComplaintTypeSchema {
        complaint_type: "waiting_time",
        title: "Long waiting time",
        fields: WAITING_TIME_FIELDS,
        image_required: false,
        image_label: "Upload a photo (queue, ticket number)",
    },
    ComplaintTypeSchema {
        complaint_type: "other",
        title: "Other issue",
        fields: OTHER_FIELDS,
        image_required: false,
        image_label: "Upload a photo (if any)",
    },
];

/// Looks up the schema for a complaint-type discriminator.
///
/// `None` means "no dynamic section": either nothing is selected yet or the
/// discriminator is unknown. Neither is an error.
pub fn resolve_schema(complaint_type: &str) -> Option<&'static ComplaintTypeSchema> {
    let schema = SCHEMAS
        .iter()
        .find(|schema| schema.complaint_type == complaint_type);

    if schema.is_none() && !complaint_type.is_empty() {
        debug!("No schema for complaint type {:?}", complaint_type);
    }

    schema
}

/// All schemas, in display order.
pub fn all_schemas() -> &'static [ComplaintTypeSchema] {
    &SCHEMAS
}

/// Checks one schema against the field-set invariants.
pub fn check_schema(schema: &ComplaintTypeSchema) -> Result<(), SchemaError> {
    let complaint_type = schema.complaint_type.to_string();
    let mut seen = HashSet::new();

    for field in schema.fields {
        if !seen.insert(field.name) {
            return Err(SchemaError::DuplicateField {
                complaint_type,
                field: field.name.to_string(),
            });
        }

        if BASE_FIELD_NAMES.contains(&field.name) {
            return Err(SchemaError::ReservedName {
                complaint_type,
                field: field.name.to_string(),
            });
        }

        let is_select = field.field_type == FieldType::Select;
        if is_select == field.options.is_empty() {
            return Err(SchemaError::OptionsMismatch {
                complaint_type,
                field: field.name.to_string(),
            });
        }

        let has_numeric = field.min.is_some() || field.step.is_some();
        if has_numeric && field.field_type != FieldType::Number {
            return Err(SchemaError::NumericConstraintOnNonNumber {
                complaint_type,
                field: field.name.to_string(),
            });
        }
    }

    Ok(())
}

/// Checks every built-in schema. Run once at startup.
pub fn verify_catalogue() -> Result<(), SchemaError> {
    for schema in all_schemas() {
        check_schema(schema)?;
    }
    info!("Verified {} complaint type schemas", SCHEMAS.len());
    Ok(())
}
