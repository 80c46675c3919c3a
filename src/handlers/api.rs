use axum::{
    extract::{multipart::MultipartError, Json as ExtractJson, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::MemoryCredentials;
use crate::client::{ComplaintApiClient, ComplaintBackend};
use crate::error::{
    ApiError, ErrorBody, IntakeError, UploadError, ValidationFailure, ValidationResult,
};
use crate::models::common::ComplaintFilters;
use crate::models::complaint::{
    AdminComplaint, AdminProfile, Attachment, Branch, ComplaintBase, ComplaintRecord, ImageFile,
    SubmissionReceipt,
};
use crate::models::schema::{ComplaintTypeSchema, ComplaintTypeSummary};
use crate::services::export::complaints_to_csv;
use crate::services::intake::{IntakeSession, SubmissionDraft};
use crate::services::schema::{all_schemas, resolve_schema};
use crate::services::uploads::upload_batch;
use crate::services::validation::{validate, validate_base, ATTACHMENTS_FIELD};

// AppState struct containing shared resources
pub struct AppState {
    pub backend: Arc<dyn ComplaintBackend>,
    /// Concrete client for the admin proxy routes; `None` disables them.
    pub admin_client: Option<ComplaintApiClient>,
    pub max_attachments: usize,
    pub max_upload_bytes: usize,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorBody>)>;

fn api_error(err: &ApiError) -> (StatusCode, Json<ErrorBody>) {
    let status = if err.is_unauthorized() {
        StatusCode::UNAUTHORIZED
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(ErrorBody::new(err.user_message())))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub complaint_type: String,
    #[serde(default)]
    pub dynamic_fields: HashMap<String, Value>,
    #[serde(default)]
    pub attachment_count: usize,
    #[serde(default)]
    pub base: Option<ComplaintBase>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub field_errors: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitComplaintRequest {
    #[serde(flatten)]
    pub base: ComplaintBase,
    #[serde(default)]
    pub dynamic_fields: HashMap<String, Value>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub complaint: Option<ComplaintRecord>,
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Attachments the caller's draft already holds.
    #[serde(default)]
    pub existing: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub attachments: Vec<Attachment>,
    pub failures: Vec<UploadFailure>,
}

#[derive(Debug, Serialize)]
pub struct ComplaintListResponse {
    pub complaints: Vec<AdminComplaint>,
}

// List complaint types endpoint
pub async fn list_complaint_types() -> Json<Vec<ComplaintTypeSummary>> {
    Json(all_schemas().iter().map(ComplaintTypeSummary::from).collect())
}

// Schema for one complaint type
pub async fn get_complaint_type(
    Path(complaint_type): Path<String>,
) -> ApiResult<Json<&'static ComplaintTypeSchema>> {
    match resolve_schema(&complaint_type) {
        Some(schema) => Ok(Json(schema)),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new(format!(
                "Unknown complaint type: {}",
                complaint_type
            ))),
        )),
    }
}

// Active branches for the branch selector
pub async fn list_branches(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Branch>>> {
    match state.backend.active_branches().await {
        Ok(branches) => {
            info!("Loaded {} branches", branches.len());
            Ok(Json(branches))
        }
        Err(err) => {
            error!("Failed to load branches: {}", err);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody::new("Failed to load branches")),
            ))
        }
    }
}

// Validate a draft without submitting it
pub async fn validate_complaint(
    ExtractJson(request): ExtractJson<ValidateRequest>,
) -> Json<ValidateResponse> {
    // The top-level complaint type is the only discriminator
    let complaint_type = request.complaint_type.trim().to_string();

    let mut result = match request.base {
        Some(mut base) => {
            base.complaint_type = complaint_type.clone();
            validate_base(&base)
        }
        None => ValidationResult::new(),
    };

    match resolve_schema(&complaint_type) {
        Some(schema) => result.merge(validate(
            schema,
            &request.dynamic_fields,
            request.attachment_count,
        )),
        None => {
            let field = "complaintType".to_string();
            let failure = if complaint_type.is_empty() {
                ValidationFailure::MissingField { field }
            } else {
                ValidationFailure::InvalidOption { field }
            };
            result.add("complaintType", failure);
        }
    }

    debug!(
        "Validated {} draft: {} invalid field(s)",
        complaint_type,
        result.len()
    );

    Json(ValidateResponse {
        valid: result.is_valid(),
        field_errors: result.messages(),
    })
}

// Validate and forward a complaint to the backend
pub async fn submit_complaint(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<SubmitComplaintRequest>,
) -> ApiResult<(StatusCode, Json<SubmissionReceipt>)> {
    info!(
        "Received {} complaint for branch {}",
        request.base.complaint_type, request.base.branch_id
    );

    let draft = SubmissionDraft::from_parts(
        request.base,
        request.dynamic_fields,
        request.attachments,
        state.max_attachments,
    )
    .map_err(|err| {
        warn!("Rejecting complaint: {}", err);
        let mut body = ErrorBody::new("Validation failed");
        body.field_errors
            .insert(ATTACHMENTS_FIELD.to_string(), err.to_string());
        (StatusCode::UNPROCESSABLE_ENTITY, Json(body))
    })?;

    let mut session = IntakeSession::with_draft(draft);
    match session.submit(state.backend.as_ref()).await {
        Ok(complaint_number) => Ok((
            StatusCode::CREATED,
            Json(SubmissionReceipt { complaint_number }),
        )),
        Err(IntakeError::Invalid(result)) => {
            debug!("Complaint failed validation: {:?}", result.messages());
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorBody::validation(&result)),
            ))
        }
        Err(IntakeError::Backend(err)) => Err(api_error(&err)),
        Err(err) => {
            error!("Unexpected intake failure: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(err.to_string())),
            ))
        }
    }
}

// Complaint status lookup; an unknown number is a normal empty result
pub async fn complaint_status(
    State(state): State<Arc<AppState>>,
    Path(complaint_number): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    match state.backend.complaint_status(&complaint_number).await {
        Ok(complaint) => {
            if complaint.is_none() {
                info!("No complaint found for {}", complaint_number.trim());
            }
            Ok(Json(StatusResponse { complaint }))
        }
        Err(err) => {
            error!("Failed to look up complaint {}: {}", complaint_number, err);
            Err(api_error(&err))
        }
    }
}

// Upload a batch of images; each file succeeds or fails on its own
pub async fn upload_images(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    // Oversized bodies surface here as 413
    let rejected_upload = |e: MultipartError, context: String| {
        warn!("{}: {}", context, e.body_text());
        (e.status(), Json(ErrorBody::new(format!("{}: {}", context, e.body_text()))))
    };

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| rejected_upload(e, "Invalid upload".to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| rejected_upload(e, format!("Failed to read {}", file_name)))?;
        files.push(ImageFile::new(file_name, content_type, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody::new("No files uploaded")),
        ));
    }

    let over_cap = query
        .existing
        .checked_add(files.len())
        .map_or(true, |total| total > state.max_attachments);
    if over_cap {
        let err = UploadError::TooManyAttachments {
            limit: state.max_attachments,
        };
        warn!("Rejecting upload of {} file(s): {}", files.len(), err);
        let mut body = ErrorBody::new(err.to_string());
        body.field_errors
            .insert(ATTACHMENTS_FIELD.to_string(), err.to_string());
        return Err((StatusCode::UNPROCESSABLE_ENTITY, Json(body)));
    }

    // Scratch draft sized to the caller's remaining slots
    let mut draft = SubmissionDraft::new(state.max_attachments.saturating_sub(query.existing));
    let outcomes = upload_batch(
        state.backend.as_ref(),
        &mut draft,
        files,
        state.max_upload_bytes,
    )
    .await
    .map_err(|err| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorBody::new(err.to_string())),
        )
    })?;

    let failures = outcomes
        .into_iter()
        .filter_map(|outcome| match outcome.result {
            Ok(_) => None,
            Err(err) => Some(UploadFailure {
                file_name: outcome.file_name,
                error: err.to_string(),
            }),
        })
        .collect();

    Ok(Json(UploadResponse {
        attachments: draft.attachments().to_vec(),
        failures,
    }))
}

// Delete a previously uploaded image
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
) -> ApiResult<StatusCode> {
    match state.backend.delete_image(&public_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => {
            error!("Failed to delete image {}: {}", public_id, err);
            Err(api_error(&err))
        }
    }
}

fn configured_admin_client(state: &AppState) -> ApiResult<&ComplaintApiClient> {
    state.admin_client.as_ref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody::new("Admin API is not configured")),
        )
    })
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// Admin client acting with the caller's bearer token, or with the stored
// session when the request carries none
fn admin_client_for(state: &AppState, headers: &HeaderMap) -> ApiResult<ComplaintApiClient> {
    let client = configured_admin_client(state)?;

    Ok(match bearer_token(headers) {
        Some(token) => client.with_credentials(Arc::new(MemoryCredentials::with_token(token))),
        None => client.clone(),
    })
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub admin: Option<AdminProfile>,
}

// Sign in with the backend and keep the session in the credential store
pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    ExtractJson(request): ExtractJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let client = configured_admin_client(&state)?;

    match client.login(&request.username, &request.password).await {
        Ok(admin) => Ok(Json(SessionResponse {
            authenticated: true,
            admin: Some(admin),
        })),
        Err(err) => {
            warn!("Admin login failed for {}: {}", request.username, err);
            Err(api_error(&err))
        }
    }
}

// Current admin session, checked with the backend
pub async fn admin_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<SessionResponse>> {
    let client = admin_client_for(&state, &headers)?;

    match client.verify_session().await {
        Ok(admin) => Ok(Json(SessionResponse {
            authenticated: admin.is_some(),
            admin,
        })),
        Err(err) => {
            error!("Failed to check admin session: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(err.to_string())),
            ))
        }
    }
}

// Forget the stored admin session
pub async fn admin_logout(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    let client = configured_admin_client(&state)?;

    match client.logout() {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(err) => {
            error!("Failed to clear admin session: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new(err.to_string())),
            ))
        }
    }
}

// Filtered complaint list for administrators
pub async fn admin_complaints(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filters): Query<ComplaintFilters>,
) -> ApiResult<Json<ComplaintListResponse>> {
    let client = admin_client_for(&state, &headers)?;

    match client.list_complaints(&filters).await {
        Ok(complaints) => {
            info!("Returning {} complaints", complaints.len());
            Ok(Json(ComplaintListResponse { complaints }))
        }
        Err(err) => {
            error!("Failed to list complaints: {}", err);
            Err(api_error(&err))
        }
    }
}

// CSV export; rendered locally from the list when the backend export fails
pub async fn admin_export(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(filters): Query<ComplaintFilters>,
) -> ApiResult<Response> {
    let client = admin_client_for(&state, &headers)?;

    let csv = match client.export_csv(&filters).await {
        Ok(bytes) => bytes,
        Err(err) if err.is_unauthorized() => return Err(api_error(&err)),
        Err(err) => {
            warn!("Backend export failed ({}), rendering CSV locally", err);
            let complaints = client.export_complaints(&filters).await.map_err(|err| {
                error!("Failed to list complaints for export: {}", err);
                api_error(&err)
            })?;
            complaints_to_csv(&complaints).map_err(|e| {
                error!("Failed to render CSV: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new("Failed to export complaints")),
                )
            })?
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"complaints.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}
