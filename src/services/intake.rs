use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::client::ComplaintBackend;
use crate::error::{ApiError, IntakeError, UploadError, ValidationResult, GENERIC_SUBMIT_FAILURE};
use crate::models::complaint::{Attachment, ComplaintBase, SubmissionPayload, SubmissionReceipt};
use crate::models::schema::ComplaintTypeSchema;
use crate::services::payload::build_submission_payload;
use crate::services::schema::resolve_schema;
use crate::services::validation::{validate, validate_base};

pub const DEFAULT_MAX_ATTACHMENTS: usize = 5;

/// In-progress complaint owned by one form session.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDraft {
    base: ComplaintBase,
    dynamic_values: HashMap<String, Value>,
    attachments: Vec<Attachment>,
    max_attachments: usize,
}

impl Default for SubmissionDraft {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTACHMENTS)
    }
}

impl SubmissionDraft {
    pub fn new(max_attachments: usize) -> Self {
        Self {
            base: ComplaintBase::default(),
            dynamic_values: HashMap::new(),
            attachments: Vec::new(),
            max_attachments,
        }
    }

    /// Assembles a draft from a complete set of entered values.
    ///
    /// Dynamic values for names the selected schema does not declare are
    /// dropped. Fails if there are more attachments than the cap allows.
    pub fn from_parts(
        base: ComplaintBase,
        dynamic_values: HashMap<String, Value>,
        attachments: Vec<Attachment>,
        max_attachments: usize,
    ) -> Result<Self, UploadError> {
        if attachments.len() > max_attachments {
            return Err(UploadError::TooManyAttachments {
                limit: max_attachments,
            });
        }

        let mut draft = Self::new(max_attachments);
        draft.base = base;
        draft.attachments = attachments;
        for (name, value) in dynamic_values {
            if !draft.set_dynamic_value(&name, value) {
                debug!("Dropping value for undeclared field {}", name);
            }
        }
        Ok(draft)
    }

    pub fn base(&self) -> &ComplaintBase {
        &self.base
    }

    /// Edits base fields. Switching the complaint type discards every dynamic
    /// value, since they belonged to the previous schema.
    pub fn update_base(&mut self, edit: impl FnOnce(&mut ComplaintBase)) {
        let previous_type = self.base.complaint_type.clone();
        edit(&mut self.base);

        if self.base.complaint_type != previous_type {
            debug!(
                "Complaint type changed from {:?} to {:?}, clearing {} dynamic value(s)",
                previous_type,
                self.base.complaint_type,
                self.dynamic_values.len()
            );
            self.dynamic_values.clear();
        }
    }

    pub fn set_complaint_type(&mut self, complaint_type: &str) {
        self.update_base(|base| base.complaint_type = complaint_type.to_string());
    }

    pub fn schema(&self) -> Option<&'static ComplaintTypeSchema> {
        resolve_schema(&self.base.complaint_type)
    }

    /// Stores a dynamic value. Returns false (and stores nothing) when the
    /// current schema has no such field.
    pub fn set_dynamic_value(&mut self, name: &str, value: Value) -> bool {
        match self.schema() {
            Some(schema) if schema.has_field(name) => {
                self.dynamic_values.insert(name.to_string(), value);
                true
            }
            _ => false,
        }
    }

    pub fn dynamic_values(&self) -> &HashMap<String, Value> {
        &self.dynamic_values
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn max_attachments(&self) -> usize {
        self.max_attachments
    }

    pub fn remaining_slots(&self) -> usize {
        self.max_attachments.saturating_sub(self.attachments.len())
    }

    pub fn push_attachment(&mut self, attachment: Attachment) -> Result<(), UploadError> {
        if self.remaining_slots() == 0 {
            return Err(UploadError::TooManyAttachments {
                limit: self.max_attachments,
            });
        }
        self.attachments.push(attachment);
        Ok(())
    }

    pub fn take_attachment(&mut self, local_id: u64) -> Option<Attachment> {
        let index = self
            .attachments
            .iter()
            .position(|attachment| attachment.local_id == local_id)?;
        Some(self.attachments.remove(index))
    }

    /// Base and dynamic validation merged into one result.
    pub fn validate(&self) -> ValidationResult {
        let mut result = validate_base(&self.base);
        if let Some(schema) = self.schema() {
            result.merge(validate(
                schema,
                &self.dynamic_values,
                self.attachments.len(),
            ));
        }
        result
    }

    pub fn to_payload(&self) -> Option<SubmissionPayload> {
        self.schema().map(|schema| {
            build_submission_payload(
                &self.base,
                schema,
                &self.dynamic_values,
                &self.attachments,
            )
        })
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.max_attachments);
    }
}

/// Where a form session is in the submit cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeState {
    Editing { last_error: Option<String> },
    Submitting,
    Submitted { complaint_number: String },
}

/// One customer's complaint form: the draft plus its submit state machine.
///
/// `Editing -> Submitting` needs a fully valid draft. A backend
/// acknowledgement moves to `Submitted` and clears the draft; any failure
/// returns to `Editing` with the draft (attachments included) intact.
#[derive(Debug, Clone)]
pub struct IntakeSession {
    draft: SubmissionDraft,
    state: IntakeState,
}

impl Default for IntakeSession {
    fn default() -> Self {
        Self::with_draft(SubmissionDraft::default())
    }
}

impl IntakeSession {
    pub fn new(max_attachments: usize) -> Self {
        Self::with_draft(SubmissionDraft::new(max_attachments))
    }

    pub fn with_draft(draft: SubmissionDraft) -> Self {
        Self {
            draft,
            state: IntakeState::Editing { last_error: None },
        }
    }

    pub fn state(&self) -> &IntakeState {
        &self.state
    }

    pub fn draft(&self) -> &SubmissionDraft {
        &self.draft
    }

    /// Mutable draft access, only while editing.
    pub fn draft_mut(&mut self) -> Result<&mut SubmissionDraft, IntakeError> {
        match self.state {
            IntakeState::Editing { .. } => Ok(&mut self.draft),
            IntakeState::Submitting => Err(IntakeError::AlreadySubmitting),
            IntakeState::Submitted { .. } => Err(IntakeError::AlreadySubmitted),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.state == IntakeState::Submitting
    }

    /// Validates and locks the draft for submission.
    pub fn begin_submission(&mut self) -> Result<SubmissionPayload, IntakeError> {
        match self.state {
            IntakeState::Submitting => return Err(IntakeError::AlreadySubmitting),
            IntakeState::Submitted { .. } => return Err(IntakeError::AlreadySubmitted),
            IntakeState::Editing { .. } => {}
        }

        let result = self.draft.validate();
        if !result.is_valid() {
            return Err(IntakeError::Invalid(result));
        }

        let payload = self
            .draft
            .to_payload()
            .ok_or_else(|| IntakeError::NoSchema(self.draft.base.complaint_type.clone()))?;

        self.state = IntakeState::Submitting;
        Ok(payload)
    }

    /// Applies the backend's answer to an in-flight submission.
    ///
    /// Results arriving when nothing is in flight are ignored.
    pub fn complete_submission(
        &mut self,
        outcome: Result<SubmissionReceipt, ApiError>,
    ) -> Result<String, IntakeError> {
        if self.state != IntakeState::Submitting {
            warn!("Ignoring submission result: no submission in flight");
            return Err(IntakeError::NotSubmitting);
        }

        let outcome = outcome.and_then(|receipt| {
            if receipt.complaint_number.trim().is_empty() {
                Err(ApiError::Decode(
                    "acknowledgement carried no complaint number".to_string(),
                ))
            } else {
                Ok(receipt)
            }
        });

        match outcome {
            Ok(receipt) => {
                info!("Complaint submitted as {}", receipt.complaint_number);
                self.draft.reset();
                self.state = IntakeState::Submitted {
                    complaint_number: receipt.complaint_number.clone(),
                };
                Ok(receipt.complaint_number)
            }
            Err(err) => {
                error!("Complaint submission failed: {}", err);
                let message = match &err {
                    ApiError::Rejected { .. } => err.user_message(),
                    _ => GENERIC_SUBMIT_FAILURE.to_string(),
                };
                self.state = IntakeState::Editing {
                    last_error: Some(message),
                };
                Err(IntakeError::Backend(err))
            }
        }
    }

    /// Full submit: validate, send, record the outcome.
    pub async fn submit<B>(&mut self, backend: &B) -> Result<String, IntakeError>
    where
        B: ComplaintBackend + ?Sized,
    {
        let payload = self.begin_submission()?;
        let outcome = backend.submit_complaint(&payload).await;
        self.complete_submission(outcome)
    }

    /// Starts a fresh complaint after a successful submission.
    pub fn start_new(&mut self) {
        self.draft.reset();
        self.state = IntakeState::Editing { last_error: None };
    }
}
