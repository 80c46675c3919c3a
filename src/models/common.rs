use serde::{Deserialize, Serialize};

use crate::models::complaint::{ComplaintStatus, Priority};

// Admin complaint list filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintFilters {
    #[serde(default)]
    pub status: Option<ComplaintStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub branch_id: Option<String>,
    #[serde(default, rename = "hasImages")]
    pub has_images: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub fn default_limit() -> usize {
    50
}

impl Default for ComplaintFilters {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            branch_id: None,
            has_images: None,
            limit: default_limit(),
        }
    }
}

impl ComplaintFilters {
    /// Query pairs for the set filters. Export requests leave the limit out.
    pub fn to_query(&self, include_limit: bool) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(status) = self.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            query.push(("priority", priority.as_str().to_string()));
        }
        if let Some(branch_id) = self.branch_id.as_deref().filter(|id| !id.is_empty()) {
            query.push(("branch_id", branch_id.to_string()));
        }
        if let Some(has_images) = self.has_images {
            query.push(("hasImages", has_images.to_string()));
        }
        if include_limit {
            query.push(("limit", self.limit.to_string()));
        }
        query
    }
}
