//! Complaint Intake Service
//!
//! Dynamic complaint forms for a retail complaint desk. Each complaint type
//! has a fixed schema of extra fields; drafts are validated against that
//! schema, image attachments are uploaded ahead of submission, and the
//! finished payload is forwarded to the complaint backend.
//!
//! # Modules
//!
//! - `services::schema`: the complaint type catalogue
//! - `services::validation`: draft validation
//! - `services::payload`: submission payload assembly
//! - `services::intake`: draft and submission state machine
//! - `client`: `ComplaintApiClient` for the backend REST API
//! - `routes`: the axum service fronting all of the above

pub mod auth;
pub mod client;
#[cfg(test)]
pub mod client_mock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;


// Re-export the main types for ease of use
pub use client::{ComplaintApiClient, ComplaintBackend};
pub use config::AppConfig;
pub use handlers::api::AppState;
pub use routes::create_router;
pub use services::payload::build_submission_payload;
pub use services::schema::resolve_schema;
pub use services::validation::validate;
