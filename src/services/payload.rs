use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::models::complaint::{
    Attachment, ComplaintBase, SubmissionPayload, DESCRIPTION_FALLBACK,
};
use crate::models::schema::ComplaintTypeSchema;

/// Builds the backend submission body.
///
/// Dynamic values travel under `dynamicFields`, never alongside the base
/// fields, and only for names the schema declares. Attachments are reduced to
/// `{ imageUrl, publicId }`.
pub fn build_submission_payload(
    base: &ComplaintBase,
    schema: &ComplaintTypeSchema,
    dynamic_values: &HashMap<String, Value>,
    attachments: &[Attachment],
) -> SubmissionPayload {
    let dynamic_fields: BTreeMap<String, Value> = dynamic_values
        .iter()
        .filter(|(name, _)| schema.has_field(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let description = if base.description.trim().is_empty() {
        DESCRIPTION_FALLBACK.to_string()
    } else {
        base.description.clone()
    };

    SubmissionPayload {
        customer_name: base.customer_name.trim().to_string(),
        customer_phone: base
            .customer_phone
            .as_deref()
            .map(str::trim)
            .filter(|phone| !phone.is_empty())
            .map(str::to_string),
        branch_id: base.branch_id.clone(),
        complaint_type: schema.complaint_type.to_string(),
        priority: base.priority,
        description,
        purchase_date: base.purchase_date,
        dynamic_fields,
        attachments: attachments.iter().map(Attachment::to_ref).collect(),
    }
}
