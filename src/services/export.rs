use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::models::complaint::AdminComplaint;

// One CSV row per complaint
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    complaint_number: &'a str,
    customer_name: &'a str,
    customer_phone: &'a str,
    customer_email: &'a str,
    complaint_type: &'a str,
    priority: &'a str,
    status: &'a str,
    branch: &'a str,
    created_at: String,
    attachment_count: usize,
    description: &'a str,
    resolution: &'a str,
}

impl<'a> From<&'a AdminComplaint> for ExportRow<'a> {
    fn from(complaint: &'a AdminComplaint) -> Self {
        Self {
            complaint_number: &complaint.complaint_number,
            customer_name: &complaint.customer_name,
            customer_phone: complaint.customer_phone.as_deref().unwrap_or(""),
            customer_email: complaint.customer_email.as_deref().unwrap_or(""),
            complaint_type: &complaint.complaint_type,
            priority: complaint.priority.as_str(),
            status: complaint.status.as_str(),
            branch: complaint
                .branch
                .as_ref()
                .map(|branch| branch.name.as_str())
                .unwrap_or("N/A"),
            created_at: complaint.created_at.to_rfc3339(),
            attachment_count: complaint.attachments.len(),
            description: &complaint.description,
            resolution: complaint.resolution.as_deref().unwrap_or(""),
        }
    }
}

/// Writes complaints as CSV with a header row.
pub fn write_complaints_csv<W: Write>(
    writer: W,
    complaints: &[AdminComplaint],
) -> Result<(), String> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);

    for complaint in complaints {
        writer
            .serialize(ExportRow::from(complaint))
            .map_err(|e| format!("Failed to serialize complaint: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush writer: {}", e))
}

/// Renders complaints to an in-memory CSV document.
pub fn complaints_to_csv(complaints: &[AdminComplaint]) -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    write_complaints_csv(&mut buffer, complaints)?;
    Ok(buffer)
}

/// Writes complaints to a CSV file, replacing it if present.
pub fn export_to_file(path: &Path, complaints: &[AdminComplaint]) -> Result<(), String> {
    let file = File::create(path).map_err(|e| format!("Failed to create export file: {}", e))?;
    write_complaints_csv(file, complaints)?;

    info!(
        "Exported {} complaint(s) to {}",
        complaints.len(),
        path.display()
    );
    Ok(())
}
