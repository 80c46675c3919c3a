#[cfg(test)]
mod integration_tests {
    use axum::{
        extract::Query,
        http::{header, HeaderMap, HeaderValue, StatusCode},
        response::Json,
        routing::{get, post},
        Router,
    };
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::{TestServer, TestServerConfig};
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    use crate::auth::FileCredentials;

    use crate::client::ComplaintApiClient;
    use crate::client_mock::{rejected, setup_mock_backend, MockBackend, MockDataStore};
    use crate::handlers::api::AppState;
    use crate::routes::create_router;
    use crate::services::uploads::MAX_UPLOAD_BYTES;

    fn server_for(app_state: AppState, is_production: bool) -> TestServer {
        let app = create_router(Arc::new(app_state), is_production);
        let config = TestServerConfig::builder().mock_transport().build();
        TestServer::new_with_config(app, config).unwrap()
    }

    fn state_with(backend: MockBackend, admin_client: Option<ComplaintApiClient>) -> AppState {
        AppState {
            backend: Arc::new(backend),
            admin_client,
            max_attachments: 5,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    // Helper function to set up a test server backed by the in-memory store
    fn setup_test_environment() -> (TestServer, Arc<MockDataStore>) {
        let (backend, store) = setup_mock_backend();
        (server_for(state_with(backend, None), false), store)
    }

    fn waiting_time_complaint() -> Value {
        json!({
            "customerName": "Faisal Omar",
            "customerPhone": "+966 55 000 1111",
            "branchId": "b1",
            "complaintType": "waiting_time",
            "priority": "medium",
            "description": "",
            "dynamicFields": {
                "serviceType": "Returns",
                "incidentDateTime": "2024-04-02T18:05",
                "waitingDuration": 45,
                "productName": "left over from another type"
            },
            "attachments": []
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _) = setup_test_environment();

        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn test_complaint_type_catalogue() {
        let (server, _) = setup_test_environment();

        let response = server.get("/complaint-types").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        let types = body.as_array().unwrap();
        assert_eq!(types.len(), 7);
        assert_eq!(types[0]["complaintType"], "product_quality");
        assert_eq!(types[0]["imageRequired"], true);

        let response = server.get("/complaint-types/waiting_time").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let schema: Value = response.json();
        let duration = schema["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|field| field["name"] == "waitingDuration")
            .unwrap();
        assert_eq!(duration["min"], json!(1.0));

        let response = server.get("/complaint-types/refund_request").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_branch_list() {
        let (server, _) = setup_test_environment();

        let response = server.get("/branches").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body[0]["id"], "b1");
        assert_eq!(body[1]["city"], "Jeddah");
    }

    #[tokio::test]
    async fn test_branch_list_failure_is_bad_gateway() {
        let mut backend = MockBackend::new();
        backend
            .expect_active_branches()
            .returning(|| Err(rejected(500, "Error: database offline")));
        let server = server_for(state_with(backend, None), false);

        let response = server.get("/branches").await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_validate_endpoint_reports_every_field() {
        let (server, _) = setup_test_environment();

        let response = server
            .post("/complaints/validate")
            .json(&json!({
                "complaintType": "pricing_dispute",
                "dynamicFields": { "receiptPrice": "abc" },
                "attachmentCount": 0,
                "base": { "customerName": "A", "branchId": "b1", "complaintType": "pricing_dispute" }
            }))
            .await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["valid"], false);
        let errors = body["fieldErrors"].as_object().unwrap();
        for field in [
            "customerName",
            "productName",
            "receiptPrice",
            "expectedPrice",
            "incidentDateTime",
            "attachments",
        ] {
            assert!(errors.contains_key(field), "missing error for {}", field);
        }
    }

    #[tokio::test]
    async fn test_validate_endpoint_accepts_valid_draft() {
        let (server, _) = setup_test_environment();

        let response = server
            .post("/complaints/validate")
            .json(&json!({
                "complaintType": "waiting_time",
                "dynamicFields": { "serviceType": "Billing", "incidentDateTime": "2024-04-02T18:05", "waitingDuration": 45 }
            }))
            .await;

        let body: Value = response.json();
        assert_eq!(body["valid"], true);
        assert!(body["fieldErrors"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_validate_uses_top_level_complaint_type() {
        let (server, _) = setup_test_environment();

        let response = server
            .post("/complaints/validate")
            .json(&json!({
                "complaintType": "waiting_time",
                "dynamicFields": {},
                "base": { "customerName": "Faisal", "branchId": "b1", "complaintType": "no_such_type" }
            }))
            .await;

        let body: Value = response.json();
        let errors = body["fieldErrors"].as_object().unwrap();
        assert!(!errors.contains_key("complaintType"));
        assert!(errors.contains_key("waitingDuration"));
        assert!(!errors.contains_key("issueDetails"));

        let response = server
            .post("/complaints/validate")
            .json(&json!({ "complaintType": "  ", "dynamicFields": {} }))
            .await;
        let body: Value = response.json();
        assert_eq!(body["fieldErrors"]["complaintType"], "complaintType is required");
    }

    #[tokio::test]
    async fn test_submit_complaint_workflow() {
        let (server, store) = setup_test_environment();

        // 1. Submit the complaint
        let response = server.post("/complaints").json(&waiting_time_complaint()).await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        let body: Value = response.json();
        let number = body["complaintNumber"].as_str().unwrap().to_string();
        assert!(number.starts_with("COMP-"));

        // 2. The backend got a clean payload
        let stored = store.complaint(&number).unwrap();
        assert_eq!(stored.description, "No description provided");
        assert!(!stored.dynamic_fields.contains_key("productName"));
        assert_eq!(stored.dynamic_fields["waitingDuration"], json!(45));

        // 3. The status page finds it
        let response = server.get(&format!("/complaints/status/{}", number)).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["complaint"]["complaintNumber"], number);
        assert_eq!(body["complaint"]["status"], "pending");
        assert_eq!(body["complaint"]["branchName"], "Downtown");
    }

    #[tokio::test]
    async fn test_invalid_submission_is_unprocessable() {
        let (server, store) = setup_test_environment();

        let mut complaint = waiting_time_complaint();
        complaint["dynamicFields"]["waitingDuration"] = json!(0);

        let response = server.post("/complaints").json(&complaint).await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert_eq!(body["fieldErrors"]["waitingDuration"], "waitingDuration must be at least 1");
        assert_eq!(store.complaint_count(), 0);
    }

    #[tokio::test]
    async fn test_too_many_attachments_is_unprocessable() {
        let (server, store) = setup_test_environment();

        let mut complaint = waiting_time_complaint();
        complaint["attachments"] = (0..6)
            .map(|i| json!({ "imageUrl": format!("u{}", i), "publicId": format!("p{}", i) }))
            .collect();

        let response = server.post("/complaints").json(&complaint).await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert!(body["fieldErrors"]["attachments"].is_string());
        assert_eq!(store.complaint_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_rejection_surfaces_message() {
        let mut backend = MockBackend::new();
        backend
            .expect_submit_complaint()
            .times(1)
            .returning(|_| Err(rejected(400, "Error: Branch not found")));
        let server = server_for(state_with(backend, None), false);

        let response = server.post("/complaints").json(&waiting_time_complaint()).await;
        assert_eq!(response.status_code(), StatusCode::BAD_GATEWAY);
        let body: Value = response.json();
        assert_eq!(body["error"], "Error: Branch not found");
    }

    #[tokio::test]
    async fn test_unknown_complaint_number_is_empty_result() {
        let (server, _) = setup_test_environment();

        let response = server.get("/complaints/status/COMP-0-0000").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert!(body["complaint"].is_null());
    }

    #[tokio::test]
    async fn test_delete_upload() {
        let (backend, store) = setup_mock_backend();
        let uploaded = store.store_image("shelf.jpg");
        let server = server_for(state_with(backend, None), false);

        let response = server
            .delete(&format!("/uploads/{}", uploaded.public_id.replace('/', "%2F")))
            .await;
        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
        assert_eq!(store.image_count(), 0);
    }

    fn image_part(file_name: &str, bytes: Vec<u8>) -> Part {
        Part::bytes(bytes).file_name(file_name).mime_type("image/jpeg")
    }

    fn jpeg(file_name: &str) -> Part {
        image_part(file_name, vec![0xFF, 0xD8, 0xFF, 0xE0])
    }

    #[tokio::test]
    async fn test_upload_reports_each_file() {
        let (server, store) = setup_test_environment();

        let form = MultipartForm::new()
            .add_part("images", jpeg("shelf.jpg"))
            .add_part(
                "images",
                Part::bytes(b"hello".to_vec())
                    .file_name("notes.txt")
                    .mime_type("text/plain"),
            );
        let response = server.post("/uploads").multipart(form).await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        let attachments = body["attachments"].as_array().unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0]["fileName"], "shelf.jpg");
        assert!(attachments[0]["publicId"].as_str().unwrap().ends_with("shelf.jpg"));
        assert_eq!(body["failures"][0]["fileName"], "notes.txt");
        assert_eq!(store.image_count(), 1);
    }

    #[tokio::test]
    async fn test_upload_respects_remaining_slots() {
        let (server, store) = setup_test_environment();

        let form = MultipartForm::new()
            .add_part("images", jpeg("a.jpg"))
            .add_part("images", jpeg("b.jpg"));
        let response = server
            .post("/uploads")
            .add_query_param("existing", 4)
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json();
        assert!(body["fieldErrors"]["attachments"].is_string());
        assert_eq!(store.image_count(), 0);

        let form = MultipartForm::new()
            .add_part("images", jpeg("a.jpg"))
            .add_part("images", jpeg("b.jpg"));
        let response = server
            .post("/uploads")
            .add_query_param("existing", 3)
            .multipart(form)
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(store.image_count(), 2);
    }

    #[tokio::test]
    async fn test_upload_with_huge_existing_count_is_rejected() {
        let (server, store) = setup_test_environment();

        let form = MultipartForm::new().add_part("images", jpeg("a.jpg"));
        let response = server
            .post("/uploads")
            .add_query_param("existing", usize::MAX)
            .multipart(form)
            .await;

        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(store.image_count(), 0);
    }

    #[tokio::test]
    async fn test_upload_size_limits() {
        let (backend, store) = setup_mock_backend();
        let state = AppState {
            max_attachments: 1,
            max_upload_bytes: 8,
            ..state_with(backend, None)
        };
        let server = server_for(state, false);

        // Within the body limit but over the per-file ceiling
        let form = MultipartForm::new().add_part("images", image_part("big.jpg", vec![0; 9]));
        let response = server.post("/uploads").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert!(body["attachments"].as_array().unwrap().is_empty());
        assert_eq!(body["failures"][0]["fileName"], "big.jpg");

        // Past the body limit for a single 8 byte file
        let form =
            MultipartForm::new().add_part("images", image_part("huge.jpg", vec![0; 128 * 1024]));
        let response = server.post("/uploads").multipart(form).await;
        assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.image_count(), 0);
    }

    #[tokio::test]
    async fn test_router_builds_with_extreme_upload_config() {
        let (backend, _) = setup_mock_backend();
        let state = AppState {
            max_attachments: usize::MAX,
            max_upload_bytes: usize::MAX,
            ..state_with(backend, None)
        };
        let server = server_for(state, false);

        let response = server.get("/health").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_hidden_in_production() {
        let (backend, _) = setup_mock_backend();
        let admin = ComplaintApiClient::with_base_url("http://127.0.0.1:9/api");
        let server = server_for(state_with(backend, Some(admin)), true);

        let response = server.get("/admin/complaints").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        // Intake routes remain
        let response = server.get("/complaint-types").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_admin_routes_need_configuration_and_session() {
        let (server, _) = setup_test_environment();
        let response = server.get("/admin/complaints").await;
        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let (backend, _) = setup_mock_backend();
        let admin = ComplaintApiClient::with_base_url("http://127.0.0.1:9/api");
        let server = server_for(state_with(backend, Some(admin)), false);
        let response = server.get("/admin/complaints").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }

    const ADMIN_TOKEN: &str = "test-admin-token";

    fn has_admin_token(headers: &HeaderMap) -> bool {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            == Some(&format!("Bearer {}", ADMIN_TOKEN)[..])
    }

    fn stored_complaint(index: usize) -> Value {
        json!({
            "_id": format!("id-{}", index),
            "complaintNumber": format!("COMP-1717228800000-{:04}", index),
            "customerName": "Huda",
            "complaintType": "other",
            "priority": "low",
            "status": "resolved",
            "branchId": { "_id": "b1", "name": "Downtown" },
            "description": "Broken trolley",
            "resolution": "Trolley replaced",
            "createdAt": "2024-06-01T08:00:00Z"
        })
    }

    // Fake backend admin API holding `total` complaints; its export endpoint
    // is broken. Returns the API root and the recorded list queries.
    async fn spawn_admin_backend(total: usize) -> (String, Arc<Mutex<Vec<HashMap<String, String>>>>) {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&queries);

        let complaints = move |headers: HeaderMap, Query(query): Query<HashMap<String, String>>| {
            let recorded = Arc::clone(&recorded);
            async move {
                if !has_admin_token(&headers) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" })));
                }
                // Honour the limit like the real backend
                let count = query
                    .get("limit")
                    .and_then(|limit| limit.parse::<usize>().ok())
                    .map_or(total, |limit| limit.min(total));
                recorded.lock().unwrap().push(query);
                let complaints: Vec<Value> = (0..count).map(stored_complaint).collect();
                (StatusCode::OK, Json(json!({ "complaints": complaints })))
            }
        };

        let router = Router::new()
            .route(
                "/api/auth/login",
                post(|Json(body): Json<Value>| async move {
                    if body["password"] == "secret" {
                        Json(json!({
                            "success": true,
                            "token": ADMIN_TOKEN,
                            "admin": { "_id": "a1", "username": "admin" }
                        }))
                    } else {
                        Json(json!({ "success": false, "message": "Invalid credentials" }))
                    }
                }),
            )
            .route(
                "/api/auth/verify",
                get(|headers: HeaderMap| async move {
                    if has_admin_token(&headers) {
                        (StatusCode::OK, Json(json!({ "success": true, "admin": { "username": "admin" } })))
                    } else {
                        (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid token" })))
                    }
                }),
            )
            .route("/api/admin/complaints", get(complaints))
            .route(
                "/api/admin/export",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "export failed") }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/api", addr), queries)
    }

    fn bearer() -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", ADMIN_TOKEN)).unwrap()
    }

    #[tokio::test]
    async fn test_admin_list_uses_caller_token() {
        let (backend, _) = setup_mock_backend();
        let (api_root, queries) = spawn_admin_backend(3).await;
        let admin = ComplaintApiClient::with_base_url(api_root);
        let server = server_for(state_with(backend, Some(admin)), false);

        let response = server
            .get("/admin/complaints")
            .add_query_param("status", "resolved")
            .add_query_param("limit", 2)
            .add_header(header::AUTHORIZATION, bearer())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["complaints"].as_array().unwrap().len(), 2);
        assert_eq!(body["complaints"][0]["complaintNumber"], "COMP-1717228800000-0000");

        let queries = queries.lock().unwrap();
        assert_eq!(queries[0].get("status").map(String::as_str), Some("resolved"));
        assert_eq!(queries[0].get("limit").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn test_local_export_fallback_includes_every_complaint() {
        let (backend, _) = setup_mock_backend();
        let (api_root, queries) = spawn_admin_backend(60).await;
        let admin = ComplaintApiClient::with_base_url(api_root);
        let server = server_for(state_with(backend, Some(admin)), false);

        let response = server
            .get("/admin/export")
            .add_header(header::AUTHORIZATION, bearer())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            response.header(header::CONTENT_TYPE),
            HeaderValue::from_static("text/csv; charset=utf-8")
        );

        let csv = response.text();
        assert!(csv.starts_with("complaint_number,"));
        // Header plus all 60 rows, past the default page size of 50
        assert_eq!(csv.lines().count(), 61);
        assert!(csv.contains("COMP-1717228800000-0059,Huda,"));
        assert!(csv.contains("Trolley replaced"));

        let queries = queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(!queries[0].contains_key("limit"));
    }

    #[tokio::test]
    async fn test_admin_session_persists_in_credential_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("admin.json");
        let (backend, _) = setup_mock_backend();
        let (api_root, _) = spawn_admin_backend(1).await;
        let admin = ComplaintApiClient::with_base_url(api_root)
            .with_credentials(Arc::new(FileCredentials::new(&path)));
        let server = server_for(state_with(backend, Some(admin)), false);

        // Nothing stored yet
        let response = server.get("/admin/complaints").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        let body: Value = server.get("/admin/session").await.json();
        assert_eq!(body["authenticated"], false);

        let response = server
            .post("/admin/login")
            .json(&json!({ "username": "admin", "password": "wrong" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert!(!path.exists());

        let response = server
            .post("/admin/login")
            .json(&json!({ "username": "admin", "password": "secret" }))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["admin"]["username"], "admin");
        assert!(path.exists());

        // The stored session is used when the request carries no token
        let response = server.get("/admin/complaints").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = server.get("/admin/session").await.json();
        assert_eq!(body["authenticated"], true);

        let response = server.post("/admin/logout").await;
        assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
        assert!(!path.exists());
        let response = server.get("/admin/complaints").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    }
}
