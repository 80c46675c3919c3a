#[cfg(test)]
mod schema_tests {
    use std::collections::HashSet;

    use crate::error::SchemaError;
    use crate::models::complaint::BASE_FIELD_NAMES;
    use crate::models::schema::{ComplaintTypeSchema, FieldSpec, FieldType};
    use crate::services::schema::{all_schemas, check_schema, resolve_schema, verify_catalogue};

    const COMPLAINT_TYPES: [&str; 7] = [
        "product_quality",
        "service_issue",
        "staff_behavior",
        "pricing_dispute",
        "cleanliness",
        "waiting_time",
        "other",
    ];

    #[test]
    fn test_every_complaint_type_resolves() {
        for complaint_type in COMPLAINT_TYPES {
            let schema = resolve_schema(complaint_type);
            assert!(schema.is_some(), "{} should resolve", complaint_type);
            assert_eq!(schema.unwrap().complaint_type, complaint_type);
        }
        assert_eq!(all_schemas().len(), COMPLAINT_TYPES.len());
    }

    #[test]
    fn test_unknown_or_empty_type_has_no_schema() {
        assert!(resolve_schema("").is_none());
        assert!(resolve_schema("refund_request").is_none());
        // Discriminators are exact
        assert!(resolve_schema("Product_Quality").is_none());
    }

    #[test]
    fn test_field_names_unique_and_disjoint_from_base_fields() {
        for schema in all_schemas() {
            let mut seen = HashSet::new();
            for field in schema.fields {
                assert!(
                    seen.insert(field.name),
                    "{} declares {} twice",
                    schema.complaint_type,
                    field.name
                );
                assert!(
                    !BASE_FIELD_NAMES.contains(&field.name),
                    "{} reuses base field {}",
                    schema.complaint_type,
                    field.name
                );
            }
        }
    }

    #[test]
    fn test_options_only_on_select_fields() {
        for schema in all_schemas() {
            for field in schema.fields {
                let is_select = field.field_type == FieldType::Select;
                assert_eq!(is_select, !field.options.is_empty(), "{}", field.name);
                if field.min.is_some() || field.step.is_some() {
                    assert_eq!(field.field_type, FieldType::Number, "{}", field.name);
                }
            }
        }
    }

    #[test]
    fn test_catalogue_passes_its_own_checks() {
        assert!(verify_catalogue().is_ok());
    }

    #[test]
    fn test_image_requirements() {
        let required: Vec<&str> = all_schemas()
            .iter()
            .filter(|schema| schema.image_required)
            .map(|schema| schema.complaint_type)
            .collect();
        assert_eq!(required, vec!["product_quality", "pricing_dispute", "cleanliness"]);
    }

    #[test]
    fn test_waiting_duration_has_minimum_of_one() {
        let schema = resolve_schema("waiting_time").unwrap();
        let field = schema.field("waitingDuration").unwrap();
        assert_eq!(field.field_type, FieldType::Number);
        assert_eq!(field.min, Some(1.0));
        assert!(field.required);
    }

    const COLLIDING_FIELDS: &[FieldSpec] = &[FieldSpec::new(
        "purchaseDate",
        "Purchase date",
        FieldType::Date,
        true,
    )];

    const DUPLICATE_FIELDS: &[FieldSpec] = &[
        FieldSpec::new("note", "Note", FieldType::Text, false),
        FieldSpec::new("note", "Note again", FieldType::Text, false),
    ];

    const BARE_SELECT_FIELDS: &[FieldSpec] =
        &[FieldSpec::new("kind", "Kind", FieldType::Select, true)];

    const MIN_ON_TEXT_FIELDS: &[FieldSpec] =
        &[FieldSpec::new("count", "Count", FieldType::Text, true).min(1.0)];

    fn schema_with(fields: &'static [FieldSpec]) -> ComplaintTypeSchema {
        ComplaintTypeSchema {
            complaint_type: "test",
            title: "Test",
            fields,
            image_required: false,
            image_label: "",
        }
    }

    #[test]
    fn test_check_schema_rejects_bad_tables() {
        assert!(matches!(
            check_schema(&schema_with(COLLIDING_FIELDS)),
            Err(SchemaError::ReservedName { .. })
        ));
        assert!(matches!(
            check_schema(&schema_with(DUPLICATE_FIELDS)),
            Err(SchemaError::DuplicateField { .. })
        ));
        assert!(matches!(
            check_schema(&schema_with(BARE_SELECT_FIELDS)),
            Err(SchemaError::OptionsMismatch { .. })
        ));
        assert!(matches!(
            check_schema(&schema_with(MIN_ON_TEXT_FIELDS)),
            Err(SchemaError::NumericConstraintOnNonNumber { .. })
        ));
    }

    #[test]
    fn test_schema_serializes_for_rendering() {
        let schema = resolve_schema("service_issue").unwrap();
        let json = serde_json::to_value(schema).unwrap();

        assert_eq!(json["complaintType"], "service_issue");
        assert_eq!(json["imageRequired"], false);
        let first = &json["fields"][0];
        assert_eq!(first["name"], "serviceType");
        assert_eq!(first["type"], "select");
        assert!(first["options"].as_array().unwrap().len() > 1);

        // Non-select fields carry no options key
        let datetime = &json["fields"][1];
        assert_eq!(datetime["type"], "datetime");
        assert!(datetime.get("options").is_none());
    }
}
