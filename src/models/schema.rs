use serde::Serialize;

/// Input control kind for a dynamic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Datetime,
    Select,
    Textarea,
}

fn no_options(options: &&'static [&'static str]) -> bool {
    options.is_empty()
}

/// One dynamic input in a complaint-type schema.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<&'static str>,
}

impl FieldSpec {
    pub const fn new(
        name: &'static str,
        label: &'static str,
        field_type: FieldType,
        required: bool,
    ) -> Self {
        Self {
            name,
            label,
            field_type,
            required,
            options: &[],
            min: None,
            step: None,
            placeholder: None,
        }
    }

    pub const fn options(self, options: &'static [&'static str]) -> Self {
        Self { options, ..self }
    }

    pub const fn min(self, min: f64) -> Self {
        Self {
            min: Some(min),
            ..self
        }
    }

    pub const fn step(self, step: f64) -> Self {
        Self {
            step: Some(step),
            ..self
        }
    }

    pub const fn placeholder(self, placeholder: &'static str) -> Self {
        Self {
            placeholder: Some(placeholder),
            ..self
        }
    }
}

/// Field set, attachment rule and labels for one complaint type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintTypeSchema {
    pub complaint_type: &'static str,
    pub title: &'static str,
    pub fields: &'static [FieldSpec],
    pub image_required: bool,
    pub image_label: &'static str,
}

impl ComplaintTypeSchema {
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Catalogue entry for listing complaint types.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplaintTypeSummary {
    pub complaint_type: &'static str,
    pub title: &'static str,
    pub image_required: bool,
}

impl From<&ComplaintTypeSchema> for ComplaintTypeSummary {
    fn from(schema: &ComplaintTypeSchema) -> Self {
        Self {
            complaint_type: schema.complaint_type,
            title: schema.title,
            image_required: schema.image_required,
        }
    }
}
