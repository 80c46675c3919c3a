use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::ComplaintBackend;
use crate::error::ApiError;
use crate::models::complaint::{
    AttachmentRef, Branch, ComplaintRecord, ComplaintStatus, ImageFile, Priority,
    SubmissionPayload, SubmissionReceipt,
};

// Define a mock for the complaint backend
mock! {
    pub Backend {}

    #[async_trait]
    impl ComplaintBackend for Backend {
        async fn active_branches(&self) -> Result<Vec<Branch>, ApiError>;

        async fn submit_complaint(
            &self,
            payload: &SubmissionPayload,
        ) -> Result<SubmissionReceipt, ApiError>;

        async fn upload_image(&self, file: &ImageFile) -> Result<AttachmentRef, ApiError>;

        async fn delete_image(&self, public_id: &str) -> Result<(), ApiError>;

        async fn complaint_status(
            &self,
            complaint_number: &str,
        ) -> Result<Option<ComplaintRecord>, ApiError>;
    }
}

// A simple in-memory store standing in for the backend
pub struct MockDataStore {
    complaints: Mutex<HashMap<String, SubmissionPayload>>,
    images: Mutex<HashMap<String, String>>,
    branches: Vec<Branch>,
}

impl MockDataStore {
    pub fn new() -> Self {
        let branches = vec![
            Branch {
                id: "b1".to_string(),
                name: "Downtown".to_string(),
                city: "Riyadh".to_string(),
                address: Some("King Fahd Rd".to_string()),
                is_active: Some(true),
            },
            Branch {
                id: "b2".to_string(),
                name: "Corniche".to_string(),
                city: "Jeddah".to_string(),
                address: None,
                is_active: Some(true),
            },
        ];

        Self {
            complaints: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
            branches,
        }
    }

    pub fn branches(&self) -> Vec<Branch> {
        self.branches.clone()
    }

    pub fn store_complaint(&self, payload: SubmissionPayload) -> String {
        let mut complaints = self.complaints.lock().unwrap();
        let number = format!(
            "COMP-{}-{:04X}",
            Utc::now().timestamp_millis(),
            complaints.len() as u16
        );
        complaints.insert(number.clone(), payload);
        number
    }

    pub fn complaint(&self, number: &str) -> Option<SubmissionPayload> {
        self.complaints.lock().unwrap().get(number).cloned()
    }

    pub fn complaint_count(&self) -> usize {
        self.complaints.lock().unwrap().len()
    }

    pub fn store_image(&self, file_name: &str) -> AttachmentRef {
        let mut images = self.images.lock().unwrap();
        let public_id = format!("complaints/{}-{}", images.len() + 1, file_name);
        images.insert(public_id.clone(), file_name.to_string());
        AttachmentRef {
            image_url: format!("https://images.example.com/{}", public_id),
            public_id,
        }
    }

    pub fn delete_image(&self, public_id: &str) -> bool {
        self.images.lock().unwrap().remove(public_id).is_some()
    }

    pub fn image_count(&self) -> usize {
        self.images.lock().unwrap().len()
    }

    pub fn lookup(&self, number: &str) -> Option<ComplaintRecord> {
        let complaints = self.complaints.lock().unwrap();
        complaints.get(number).map(|payload| ComplaintRecord {
            complaint_number: number.to_string(),
            status: ComplaintStatus::Pending,
            priority: payload.priority.unwrap_or(Priority::Medium),
            complaint_type: payload.complaint_type.clone(),
            description: payload.description.clone(),
            branch_name: self
                .branches
                .iter()
                .find(|branch| branch.id == payload.branch_id)
                .map(|branch| branch.name.clone()),
            branch_address: None,
            resolution: None,
            created_at: Utc::now(),
            updated_at: None,
        })
    }
}

// Set up a mock backend whose calls go to the in-memory store
pub fn setup_mock_backend() -> (MockBackend, Arc<MockDataStore>) {
    let data_store = Arc::new(MockDataStore::new());
    let mut mock_backend = MockBackend::new();

    let store_ref1 = Arc::clone(&data_store);
    mock_backend
        .expect_active_branches()
        .returning(move || Ok(store_ref1.branches()));

    let store_ref2 = Arc::clone(&data_store);
    mock_backend
        .expect_submit_complaint()
        .returning(move |payload| {
            let complaint_number = store_ref2.store_complaint(payload.clone());
            Ok(SubmissionReceipt { complaint_number })
        });

    let store_ref3 = Arc::clone(&data_store);
    mock_backend
        .expect_upload_image()
        .returning(move |file| Ok(store_ref3.store_image(&file.file_name)));

    let store_ref4 = Arc::clone(&data_store);
    mock_backend
        .expect_delete_image()
        .returning(move |public_id| {
            store_ref4.delete_image(public_id);
            Ok(())
        });

    let store_ref5 = Arc::clone(&data_store);
    mock_backend
        .expect_complaint_status()
        .returning(move |number| Ok(store_ref5.lookup(number.trim())));

    (mock_backend, data_store)
}

pub fn rejected(status: u16, message: &str) -> ApiError {
    ApiError::Rejected {
        status,
        message: message.to_string(),
    }
}
