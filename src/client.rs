use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::{active_token, CredentialProvider, MemoryCredentials, StoredCredentials};
use crate::config::AppConfig;
use crate::error::{ApiError, BackendErrorBody};
use crate::models::common::ComplaintFilters;
use crate::models::complaint::{
    AdminComplaint, AdminDashboard, AdminProfile, AttachmentRef, Branch, ComplaintRecord,
    ComplaintStats, ComplaintStatus, ImageFile, StatusUpdate, SubmissionPayload,
    SubmissionReceipt,
};

/// Backend calls the intake flow depends on.
#[async_trait]
pub trait ComplaintBackend: Send + Sync {
    /// Branches a customer can file against.
    async fn active_branches(&self) -> Result<Vec<Branch>, ApiError>;

    async fn submit_complaint(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, ApiError>;

    async fn upload_image(&self, file: &ImageFile) -> Result<AttachmentRef, ApiError>;

    async fn delete_image(&self, public_id: &str) -> Result<(), ApiError>;

    /// `Ok(None)` when no complaint has that number.
    async fn complaint_status(
        &self,
        complaint_number: &str,
    ) -> Result<Option<ComplaintRecord>, ApiError>;
}

// Branch endpoints answer with either a bare list or `{ branches: [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum BranchList {
    Wrapped { branches: Vec<Branch> },
    Bare(Vec<Branch>),
}

impl BranchList {
    fn into_branches(self) -> Vec<Branch> {
        match self {
            BranchList::Wrapped { branches } => branches,
            BranchList::Bare(branches) => branches,
        }
    }
}

#[derive(Deserialize)]
struct StatusLookupResponse {
    #[serde(default)]
    complaint: Option<ComplaintRecord>,
}

#[derive(Deserialize)]
struct ComplaintListResponse {
    #[serde(default)]
    complaints: Vec<AdminComplaint>,
}

#[derive(Deserialize)]
struct StatsResponse {
    #[serde(default)]
    stats: ComplaintStats,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    admin: Option<AdminProfile>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    admin: Option<AdminProfile>,
}

/// Client for the complaint backend REST API
#[derive(Clone)]
pub struct ComplaintApiClient {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
}

impl ComplaintApiClient {
    /// Create a client from service configuration
    pub fn new(
        config: &AppConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            credentials,
        })
    }

    /// Client with default settings and an in-memory credential store
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: Arc::new(MemoryCredentials::new()),
        }
    }

    /// Same connection pool, different credential store
    pub fn with_credentials(&self, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            credentials,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // Endpoint under the base URL; each segment is percent-encoded on its own
    fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        if let Some(segment) = segments
            .iter()
            .find(|segment| segment.is_empty() || matches!(**segment, "." | ".."))
        {
            return Err(ApiError::InvalidUrl(format!(
                "invalid path segment {:?}",
                segment
            )));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // Turn a non-2xx response into a displayable rejection
    async fn check(res: Response) -> Result<Response, ApiError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        let parsed: BackendErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed.display_message();
        warn!("Backend answered {}: {}", status, message);

        Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let res = request.send().await?;
        debug!("Response received with status: {}", res.status());

        let res = Self::check(res).await?;
        Ok(res.json::<T>().await?)
    }

    fn bearer(&self) -> Result<String, ApiError> {
        active_token(self.credentials.as_ref())?.ok_or(ApiError::NotAuthenticated)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.bearer()?;
        Ok(request.bearer_auth(token))
    }

    /// All branches, including inactive ones
    pub async fn all_branches(&self) -> Result<Vec<Branch>, ApiError> {
        info!("Fetching all branches");
        let list: BranchList = Self::send_json(self.client.get(self.url(&["branches"])?)).await?;
        Ok(list.into_branches())
    }

    /// Sign in and store the issued token
    pub async fn login(&self, username: &str, password: &str) -> Result<AdminProfile, ApiError> {
        info!("Signing in as {}", username);

        let request = self
            .client
            .post(self.url(&["auth", "login"])?)
            .json(&LoginRequest { username, password });
        let response: LoginResponse = Self::send_json(request).await?;

        match (response.success, response.token) {
            (true, Some(token)) => {
                let admin = response.admin.unwrap_or_default();
                self.credentials
                    .set(StoredCredentials::new(token, admin.clone()))?;
                info!("Signed in as {}", username);
                Ok(admin)
            }
            _ => Err(ApiError::Rejected {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message: response
                    .message
                    .unwrap_or_else(|| "Login failed".to_string()),
            }),
        }
    }

    /// Check the stored token with the backend.
    ///
    /// Any failure clears the stored credentials and reports "not signed in".
    pub async fn verify_session(&self) -> Result<Option<AdminProfile>, ApiError> {
        let request = match self.authorized(self.client.get(self.url(&["auth", "verify"])?)) {
            Ok(request) => request,
            Err(ApiError::NotAuthenticated) => return Ok(None),
            Err(err) => return Err(err),
        };

        match Self::send_json::<VerifyResponse>(request).await {
            Ok(VerifyResponse {
                success: true,
                admin,
            }) => Ok(Some(admin.unwrap_or_default())),
            Ok(_) => {
                warn!("Admin session rejected, clearing credentials");
                self.credentials.clear()?;
                Ok(None)
            }
            Err(err) => {
                error!("Admin session check failed: {}", err);
                self.credentials.clear()?;
                Ok(None)
            }
        }
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.credentials.clear()?;
        info!("Signed out");
        Ok(())
    }

    async fn fetch_complaints(
        &self,
        filters: &ComplaintFilters,
        include_limit: bool,
    ) -> Result<Vec<AdminComplaint>, ApiError> {
        let request = self.authorized(
            self.client
                .get(self.url(&["admin", "complaints"])?)
                .query(&filters.to_query(include_limit)),
        )?;
        let response: ComplaintListResponse = Self::send_json(request).await?;
        Ok(response.complaints)
    }

    /// One page of complaints, capped at `filters.limit`.
    pub async fn list_complaints(
        &self,
        filters: &ComplaintFilters,
    ) -> Result<Vec<AdminComplaint>, ApiError> {
        info!("Listing complaints with filters {:?}", filters);
        self.fetch_complaints(filters, true).await
    }

    /// Every complaint matching the filters. Exports ignore the limit.
    pub async fn export_complaints(
        &self,
        filters: &ComplaintFilters,
    ) -> Result<Vec<AdminComplaint>, ApiError> {
        info!("Listing complaints for export with filters {:?}", filters);
        self.fetch_complaints(filters, false).await
    }

    pub async fn complaint_stats(&self, branch_id: Option<&str>) -> Result<ComplaintStats, ApiError> {
        let mut request = self.client.get(self.url(&["admin", "stats"])?);
        if let Some(branch_id) = branch_id {
            request = request.query(&[("branch_id", branch_id)]);
        }
        let response: StatsResponse = Self::send_json(self.authorized(request)?).await?;
        Ok(response.stats)
    }

    pub async fn update_status(
        &self,
        complaint_id: &str,
        status: ComplaintStatus,
        resolution: Option<String>,
    ) -> Result<(), ApiError> {
        info!(
            "Updating complaint {} to status {}",
            complaint_id,
            status.as_str()
        );
        let request = self.authorized(
            self.client
                .put(self.url(&["admin", "complaints", complaint_id, "status"])?)
                .json(&StatusUpdate { status, resolution }),
        )?;

        let res = request.send().await?;
        Self::check(res).await?;
        Ok(())
    }

    /// Backend-rendered CSV export. The limit filter does not apply.
    pub async fn export_csv(&self, filters: &ComplaintFilters) -> Result<Vec<u8>, ApiError> {
        info!("Requesting complaint export");
        let request = self.authorized(
            self.client
                .get(self.url(&["admin", "export"])?)
                .query(&filters.to_query(false)),
        )?;

        let res = Self::check(request.send().await?).await?;
        Ok(res.bytes().await?.to_vec())
    }

    pub async fn branch_complaints(&self, branch_id: &str) -> Result<Vec<AdminComplaint>, ApiError> {
        let request = self
            .client
            .get(self.url(&["complaints", "branch", branch_id])?);
        let response: ComplaintListResponse = Self::send_json(request).await?;
        Ok(response.complaints)
    }

    /// Complaints, branches and stats, fetched concurrently. Fails if any does.
    pub async fn dashboard(&self, filters: &ComplaintFilters) -> Result<AdminDashboard, ApiError> {
        let (complaints, branches, stats) = futures::try_join!(
            self.list_complaints(filters),
            self.all_branches(),
            self.complaint_stats(None),
        )?;

        Ok(AdminDashboard {
            complaints,
            branches,
            stats,
        })
    }
}

#[async_trait]
impl ComplaintBackend for ComplaintApiClient {
    async fn active_branches(&self) -> Result<Vec<Branch>, ApiError> {
        info!("Fetching active branches");
        let active: Result<BranchList, ApiError> =
            Self::send_json(self.client.get(self.url(&["branches", "active"])?)).await;

        match active {
            Ok(list) => Ok(list.into_branches()),
            Err(err) => {
                warn!("Active branches unavailable ({}), falling back to all branches", err);
                self.all_branches().await
            }
        }
    }

    async fn submit_complaint(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, ApiError> {
        info!(
            "Submitting {} complaint for branch {}",
            payload.complaint_type, payload.branch_id
        );
        let request = self.client.post(self.url(&["complaints"])?).json(payload);
        let receipt: SubmissionReceipt = Self::send_json(request).await?;
        info!("Complaint accepted as {}", receipt.complaint_number);
        Ok(receipt)
    }

    async fn upload_image(&self, file: &ImageFile) -> Result<AttachmentRef, ApiError> {
        debug!("Uploading {} ({} bytes)", file.file_name, file.size());
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = Form::new().part("image", part);

        let request = self
            .client
            .post(self.url(&["upload", "upload-single"])?)
            .multipart(form);
        Self::send_json(request).await
    }

    async fn delete_image(&self, public_id: &str) -> Result<(), ApiError> {
        debug!("Deleting image {}", public_id);
        let res = self
            .client
            .delete(self.url(&["upload", "delete", public_id])?)
            .send()
            .await?;
        Self::check(res).await?;
        Ok(())
    }

    async fn complaint_status(
        &self,
        complaint_number: &str,
    ) -> Result<Option<ComplaintRecord>, ApiError> {
        let number = complaint_number.trim();
        if number.is_empty() || matches!(number, "." | "..") {
            return Ok(None);
        }

        info!("Looking up complaint {}", number);
        let res = self
            .client
            .get(self.url(&["complaints", "status", number])?)
            .send()
            .await?;

        if res.status() == StatusCode::NOT_FOUND {
            info!("Complaint {} not found", number);
            return Ok(None);
        }

        let res = Self::check(res).await?;
        let response: StatusLookupResponse = res.json().await?;
        Ok(response.complaint)
    }
}
