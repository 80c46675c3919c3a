use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    admin_complaints, admin_export, admin_login, admin_logout, admin_session, complaint_status,
    delete_upload, get_complaint_type, list_branches, list_complaint_types, submit_complaint,
    upload_images, validate_complaint, AppState,
};
use crate::handlers::health::health_check;

// Multipart framing on top of the largest allowed batch
const UPLOAD_BODY_OVERHEAD: usize = 64 * 1024;

pub fn create_router(app_state: Arc<AppState>, is_production: bool) -> Router {
    let upload_limit = app_state
        .max_upload_bytes
        .saturating_mul(app_state.max_attachments.max(1))
        .saturating_add(UPLOAD_BODY_OVERHEAD);
    let mut router = Router::new();

    // Health check is always available
    let health_route = Router::new().route("/health", get(health_check));
    router = router.merge(health_route);

    // Customer-facing intake routes are always available
    let intake_routes = Router::new()
        .route("/complaint-types", get(list_complaint_types))
        .route("/complaint-types/:complaint_type", get(get_complaint_type))
        .route("/branches", get(list_branches))
        .route("/complaints", post(submit_complaint))
        .route("/complaints/validate", post(validate_complaint))
        .route("/complaints/status/:complaint_number", get(complaint_status));
    router = router.merge(intake_routes);

    let upload_routes = Router::new()
        .route("/uploads", post(upload_images))
        .route("/uploads/:public_id", delete(delete_upload))
        .layer(DefaultBodyLimit::max(upload_limit));
    router = router.merge(upload_routes);

    // Admin proxy routes stay off in production
    if !is_production {
        let admin_routes = Router::new()
            .route("/admin/login", post(admin_login))
            .route("/admin/session", get(admin_session))
            .route("/admin/logout", post(admin_logout))
            .route("/admin/complaints", get(admin_complaints))
            .route("/admin/export", get(admin_export));

        router = router.merge(admin_routes);

        info!("Admin proxy routes enabled - server running in development mode");
    } else {
        info!("Running in production mode - only intake and health endpoints exposed");
    }

    router.with_state(app_state)
}
