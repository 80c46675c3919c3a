use futures::future::join_all;
use rand::Rng;
use tracing::{error, info, warn};

use crate::client::ComplaintBackend;
use crate::error::{ApiError, UploadError};
use crate::models::complaint::{Attachment, AttachmentRef, ImageFile};
use crate::services::intake::SubmissionDraft;

/// Client-side upload ceiling; the storage service enforces it again.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Per-file result of a batch upload.
#[derive(Debug)]
pub struct UploadOutcome {
    pub file_name: String,
    /// Local id of the new attachment on success.
    pub result: Result<u64, UploadError>,
}

impl UploadOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of removing an attachment from a draft.
#[derive(Debug)]
pub enum Removal {
    NotFound,
    Removed(Attachment),
    /// Gone from the draft, but the stored image could not be deleted.
    RemovedLocally(Attachment, ApiError),
}

/// Fast-fail checks before sending a file to storage.
pub fn check_upload(file: &ImageFile, max_bytes: usize) -> Result<(), UploadError> {
    if !file.content_type.starts_with("image/") {
        return Err(UploadError::NotAnImage {
            file_name: file.file_name.clone(),
        });
    }

    if file.size() > max_bytes {
        return Err(UploadError::TooLarge {
            file_name: file.file_name.clone(),
            size: file.size(),
            limit: max_bytes,
        });
    }

    Ok(())
}

fn new_local_id() -> u64 {
    rand::thread_rng().gen()
}

async fn upload_one<B>(
    backend: &B,
    file: &ImageFile,
    max_bytes: usize,
) -> Result<AttachmentRef, UploadError>
where
    B: ComplaintBackend + ?Sized,
{
    check_upload(file, max_bytes)?;
    backend
        .upload_image(file)
        .await
        .map_err(|err| UploadError::Storage {
            file_name: file.file_name.clone(),
            message: err.to_string(),
        })
}

/// Uploads a batch of images concurrently and appends the successes to the draft.
///
/// The whole batch is refused up front if it would exceed the draft's
/// attachment cap. Otherwise each file succeeds or fails on its own; a failed
/// file never removes an uploaded one. Outcomes come back in input order.
pub async fn upload_batch<B>(
    backend: &B,
    draft: &mut SubmissionDraft,
    files: Vec<ImageFile>,
    max_bytes: usize,
) -> Result<Vec<UploadOutcome>, UploadError>
where
    B: ComplaintBackend + ?Sized,
{
    if files.is_empty() {
        return Ok(Vec::new());
    }

    if draft.attachments().len() + files.len() > draft.max_attachments() {
        warn!(
            "Refusing batch of {} image(s): draft already holds {} of {}",
            files.len(),
            draft.attachments().len(),
            draft.max_attachments()
        );
        return Err(UploadError::TooManyAttachments {
            limit: draft.max_attachments(),
        });
    }

    info!("Uploading {} image(s)", files.len());
    let results = join_all(files.iter().map(|file| upload_one(backend, file, max_bytes))).await;

    let mut outcomes = Vec::with_capacity(files.len());
    for (file, result) in files.into_iter().zip(results) {
        let result = match result {
            Ok(uploaded) => {
                let attachment = Attachment::new(new_local_id(), file.file_name.clone(), uploaded);
                let local_id = attachment.local_id;
                draft.push_attachment(attachment).map(|_| local_id)
            }
            Err(err) => {
                error!("Upload failed: {}", err);
                Err(err)
            }
        };
        outcomes.push(UploadOutcome {
            file_name: file.file_name,
            result,
        });
    }

    let uploaded = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    info!("Uploaded {} of {} image(s)", uploaded, outcomes.len());

    Ok(outcomes)
}

/// Removes an attachment from the draft and deletes the stored image.
///
/// The attachment leaves the draft even when the remote delete fails.
pub async fn remove_attachment<B>(backend: &B, draft: &mut SubmissionDraft, local_id: u64) -> Removal
where
    B: ComplaintBackend + ?Sized,
{
    let Some(attachment) = draft.take_attachment(local_id) else {
        return Removal::NotFound;
    };

    match backend.delete_image(&attachment.public_id).await {
        Ok(()) => {
            info!("Deleted image {}", attachment.public_id);
            Removal::Removed(attachment)
        }
        Err(err) => {
            warn!(
                "Failed to delete image {} from storage, removed from draft only: {}",
                attachment.public_id, err
            );
            Removal::RemovedLocally(attachment, err)
        }
    }
}
