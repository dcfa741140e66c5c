//! Integration tests for the Trellis HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::HeaderValue;
use axum_test::TestServer;
use serde_json::json;
use std::sync::Mutex;
use trellis::api::{
    AppState, ApplicationStateResponse, CreatedResponse, DeletedResponse, ExportResponse,
    FieldResponse, HealthResponse, ListResponse, NavigateResponse, ReferenceResponse, SaveResponse,
    StatusResponse, UploadResponse, create_router,
};
use trellis_core::ApplicationStore;

/// Mutex to serialize auth tests since they modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and ensures cleanup on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var("TRELLIS_API_KEY") };
    }
}

/// Create a test server with a fresh in-memory application store.
/// Returns a guard that must be kept alive during the test.
fn create_test_server() -> (TestServer, TestGuard) {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("TRELLIS_API_KEY") };
    let store = ApplicationStore::in_memory();
    let state = AppState::new(store);
    let router = create_router(state);
    (
        TestServer::new(router).unwrap(),
        TestGuard { _guard: guard },
    )
}

/// Create a test server with one application already registered.
async fn create_server_with_application() -> (TestServer, u64, TestGuard) {
    let (server, guard) = create_test_server();
    let response = server.post("/applications").await;
    response.assert_status_ok();
    let created: CreatedResponse = response.json();
    let id = created.application_id.expect("application id");
    (server, id, guard)
}

/// Set one field and return the response body.
async fn set_field(
    server: &TestServer,
    id: u64,
    stage: &str,
    field: &str,
    value: serde_json::Value,
) -> FieldResponse {
    let response = server
        .put(&format!("/applications/{id}/fields"))
        .json(&json!({
            "stage": stage,
            "sub_form": null,
            "field": field,
            "value": value,
        }))
        .await;
    response.assert_status_ok();
    response.json()
}

/// Fill every required fund position field.
async fn fill_fund_position(server: &TestServer, id: u64) -> FieldResponse {
    set_field(server, id, "fund_position", "fund_name", json!({"text": {"value": "Meridian Infrastructure Debt Fund"}})).await;
    set_field(server, id, "fund_position", "total_aum", json!({"number": {"value": 5_000_000_000_i64}})).await;
    set_field(server, id, "fund_position", "liquid_assets", json!({"number": {"value": 1_200_000_000_i64}})).await;
    set_field(server, id, "fund_position", "as_of_date", json!({"text": {"value": "2026-03-31"}})).await
}

/// Valid fund position stage payload.
fn fund_position_payload() -> serde_json::Value {
    json!({
        "fund_position": {
            "fund_name": "Meridian Infrastructure Debt Fund",
            "total_aum_minor": 5_000_000_000_i64,
            "liquid_assets_minor": 1_200_000_000_i64,
            "as_of_date": "2026-03-31",
            "custodian": "Stock Holding Corporation",
        }
    })
}

/// Valid collateral stage payload.
fn collateral_payload() -> serde_json::Value {
    json!({
        "collateral_assets": {
            "assets": [{
                "asset_type": "government_security",
                "description": null,
                "value_minor": 2_500_000_000_i64,
                "valuation_date": "2026-03-15",
            }],
            "charge": {
                "charge_type": "exclusive_charge",
                "charge_holder": "Vistra ITCL",
                "ranking": "first",
            },
        }
    })
}

/// Valid credit ratings stage payload.
fn credit_ratings_payload() -> serde_json::Value {
    json!({
        "credit_ratings": {
            "agency": {"agency_name": "crisil", "rating_grade": "AA+"},
            "instrument": {"instrument_grade": "AA", "rated_amount_minor": 5_000_000_000_i64},
            "outlook": {"outlook": "stable", "review_date": "2027-03-31"},
        }
    })
}

/// Valid signatories stage payload.
fn signatories_payload() -> serde_json::Value {
    json!({
        "signatories": {
            "signatories": [{
                "name": "A. Rao",
                "designation": "Director",
                "email": "a.rao@meridian.example",
            }],
            "resolution": {
                "document": {
                    "file_id": "file-7",
                    "url": "/files/file-7",
                    "original_name": "resolution.pdf",
                },
                "resolution_date": "2026-02-10",
            },
        }
    })
}

/// Valid ISIN activation stage payload.
fn isin_activation_payload() -> serde_json::Value {
    json!({
        "isin_activation": {
            "isin_code": "INE123A07015",
            "activation_date": "2026-04-01",
            "depository": "nsdl",
        }
    })
}

/// Commit a stage payload and return the response body.
async fn save_stage(server: &TestServer, id: u64, payload: serde_json::Value) -> SaveResponse {
    let response = server
        .post(&format!("/applications/{id}/save"))
        .json(&json!({ "payload": payload }))
        .await;
    response.assert_status_ok();
    response.json()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[tokio::test]
async fn test_health_returns_correct_version() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;
    let health: HealthResponse = response.json();

    // Version should match Cargo.toml
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_status_empty_store() {
    let (server, _guard) = create_test_server();

    let response = server.get("/status").await;

    response.assert_status_ok();
    let status: StatusResponse = response.json();
    assert_eq!(status.application_count, 0);
    assert!(!status.persistent, "in-memory store is not persistent");
}

#[tokio::test]
async fn test_status_counts_applications() {
    let (server, _guard) = create_test_server();

    server.post("/applications").await.assert_status_ok();
    server.post("/applications").await.assert_status_ok();

    let status: StatusResponse = server.get("/status").await.json();
    assert_eq!(status.application_count, 2);
}

// =============================================================================
// APPLICATION LIFECYCLE TESTS
// =============================================================================

#[tokio::test]
async fn test_create_assigns_increasing_ids() {
    let (server, _guard) = create_test_server();

    let first: CreatedResponse = server.post("/applications").await.json();
    let second: CreatedResponse = server.post("/applications").await.json();

    assert!(first.success);
    assert_eq!(first.application_id, Some(1));
    assert_eq!(second.application_id, Some(2));
}

#[tokio::test]
async fn test_list_returns_all_ids() {
    let (server, _guard) = create_test_server();

    server.post("/applications").await.assert_status_ok();
    server.post("/applications").await.assert_status_ok();

    let response = server.get("/applications").await;
    response.assert_status_ok();
    let list: ListResponse = response.json();
    assert!(list.success);
    assert_eq!(list.applications, vec![1, 2]);
}

#[tokio::test]
async fn test_show_fresh_application() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server.get(&format!("/applications/{id}")).await;

    response.assert_status_ok();
    let state: ApplicationStateResponse = response.json();
    assert!(state.success);
    assert_eq!(state.position.as_deref(), Some("fund_position"));
    assert!(!state.submitted);
    assert_eq!(state.overall_basis_points, 0);
    assert_eq!(state.overall_percent, "0.00%");
    assert_eq!(state.stages.len(), 5, "all five stages are reported");
    for stage in &state.stages {
        assert_eq!(stage.basis_points, 0);
        assert!(!stage.complete);
        assert!(!stage.committed);
    }
}

#[tokio::test]
async fn test_show_unknown_application_returns_404() {
    let (server, _guard) = create_test_server();

    let response = server.get("/applications/999").await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
    let state: ApplicationStateResponse = response.json();
    assert!(!state.success);
    assert!(state.error.is_some());
}

#[tokio::test]
async fn test_delete_removes_application() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server.delete(&format!("/applications/{id}")).await;
    response.assert_status_ok();
    let deleted: DeletedResponse = response.json();
    assert!(deleted.success);

    // The application is gone afterwards
    let response = server.get(&format!("/applications/{id}")).await;
    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_unknown_application_returns_404() {
    let (server, _guard) = create_test_server();

    let response = server.delete("/applications/42").await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
    let deleted: DeletedResponse = response.json();
    assert!(!deleted.success);
    assert!(deleted.error.is_some());
}

// =============================================================================
// FIELD ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_set_single_field_reports_quarter_progress() {
    let (server, id, _guard) = create_server_with_application().await;

    // fund_position has four required fields carrying the full weight
    let result = set_field(
        &server,
        id,
        "fund_position",
        "fund_name",
        json!({"text": {"value": "Meridian"}}),
    )
    .await;

    assert!(result.success);
    assert_eq!(result.stage.as_deref(), Some("fund_position"));
    assert_eq!(result.stage_basis_points, 2_500, "1 of 4 required fields");
    assert!(!result.stage_complete);
    assert!(result.transition.is_none());
}

#[tokio::test]
async fn test_filling_all_required_fields_completes_the_stage() {
    let (server, id, _guard) = create_server_with_application().await;

    let result = fill_fund_position(&server, id).await;

    assert_eq!(result.stage_basis_points, 10_000);
    assert!(result.stage_complete);
    assert_eq!(
        result.transition.as_deref(),
        Some("completed"),
        "the final field flips the stage complete"
    );
}

#[tokio::test]
async fn test_empty_text_does_not_count_toward_completion() {
    let (server, id, _guard) = create_server_with_application().await;

    // Three of four fields filled; the empty string stays absent.
    set_field(&server, id, "fund_position", "fund_name", json!({"text": {"value": "Meridian"}})).await;
    set_field(&server, id, "fund_position", "total_aum", json!({"number": {"value": 100}})).await;
    set_field(&server, id, "fund_position", "liquid_assets", json!({"number": {"value": 50}})).await;
    let result = set_field(&server, id, "fund_position", "as_of_date", json!({"text": {"value": ""}})).await;

    assert_eq!(result.stage_basis_points, 7_500, "3 of 4 required fields");
    assert!(!result.stage_complete);
}

#[tokio::test]
async fn test_zero_and_false_count_as_present() {
    let (server, id, _guard) = create_server_with_application().await;

    // Regression: deliberate zero entries must not be treated as empty.
    let zero = set_field(&server, id, "fund_position", "total_aum", json!({"number": {"value": 0}})).await;
    assert_eq!(zero.stage_basis_points, 2_500, "numeric 0 is present");

    let flag = set_field(&server, id, "isin_activation", "depository", json!({"flag": {"value": false}})).await;
    assert!(
        flag.stage_basis_points > 0,
        "boolean false is present: got {}",
        flag.stage_basis_points
    );
}

#[tokio::test]
async fn test_clear_field_reopens_a_complete_stage() {
    let (server, id, _guard) = create_server_with_application().await;
    fill_fund_position(&server, id).await;

    let response = server
        .delete(&format!("/applications/{id}/fields"))
        .json(&json!({
            "stage": "fund_position",
            "sub_form": null,
            "field": "fund_name",
        }))
        .await;

    response.assert_status_ok();
    let result: FieldResponse = response.json();
    assert!(result.success);
    assert_eq!(result.stage_basis_points, 7_500);
    assert!(!result.stage_complete);
    assert_eq!(result.transition.as_deref(), Some("reopened"));
}

#[tokio::test]
async fn test_set_field_unknown_stage_returns_400() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server
        .put(&format!("/applications/{id}/fields"))
        .json(&json!({
            "stage": "underwriting",
            "sub_form": null,
            "field": "fund_name",
            "value": {"text": {"value": "x"}},
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let result: FieldResponse = response.json();
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_set_field_outside_blueprint_returns_400() {
    let (server, id, _guard) = create_server_with_application().await;

    // Unknown field with no explicit sub_form cannot be routed
    let response = server
        .put(&format!("/applications/{id}/fields"))
        .json(&json!({
            "stage": "fund_position",
            "sub_form": null,
            "field": "unknown_field",
            "value": {"text": {"value": "x"}},
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_field_overlong_name_returns_400() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server
        .put(&format!("/applications/{id}/fields"))
        .json(&json!({
            "stage": "fund_position",
            "sub_form": "fund_position",
            "field": "f".repeat(300),
            "value": {"text": {"value": "x"}},
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

// =============================================================================
// UPLOAD ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_upload_assigns_file_reference_and_counts_field() {
    let (server, id, _guard) = create_server_with_application().await;

    let content = base64_encode(b"board resolution, certified copy");
    let response = server
        .post(&format!("/applications/{id}/uploads"))
        .json(&json!({
            "stage": "signatories",
            "sub_form": null,
            "field": "resolution_document",
            "file_name": "resolution.pdf",
            "content_base64": content,
        }))
        .await;

    response.assert_status_ok();
    let upload: UploadResponse = response.json();
    assert!(upload.success);
    let file_id = upload.file_id.expect("file id assigned");
    assert!(file_id.starts_with("file-"));
    assert_eq!(upload.original_name.as_deref(), Some("resolution.pdf"));
    // board_resolution weight 5000 split over two required fields
    assert_eq!(upload.stage_basis_points, 2_500);
    assert!(!upload.stage_complete);
}

#[tokio::test]
async fn test_upload_is_content_addressed() {
    let (server, id, _guard) = create_server_with_application().await;

    let body = json!({
        "stage": "signatories",
        "sub_form": null,
        "field": "resolution_document",
        "file_name": "resolution.pdf",
        "content_base64": base64_encode(b"identical bytes"),
    });

    let first: UploadResponse = server
        .post(&format!("/applications/{id}/uploads"))
        .json(&body)
        .await
        .json();
    let second: UploadResponse = server
        .post(&format!("/applications/{id}/uploads"))
        .json(&body)
        .await
        .json();

    assert_eq!(
        first.file_id, second.file_id,
        "identical content yields the same identifier"
    );
}

#[tokio::test]
async fn test_upload_invalid_base64_returns_400() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server
        .post(&format!("/applications/{id}/uploads"))
        .json(&json!({
            "stage": "signatories",
            "sub_form": null,
            "field": "resolution_document",
            "file_name": "resolution.pdf",
            "content_base64": "not!!valid@@base64",
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let upload: UploadResponse = response.json();
    assert!(!upload.success);
}

#[tokio::test]
async fn test_upload_empty_content_returns_400() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server
        .post(&format!("/applications/{id}/uploads"))
        .json(&json!({
            "stage": "signatories",
            "sub_form": null,
            "field": "resolution_document",
            "file_name": "resolution.pdf",
            "content_base64": "",
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_empty_file_name_returns_400() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server
        .post(&format!("/applications/{id}/uploads"))
        .json(&json!({
            "stage": "signatories",
            "sub_form": null,
            "field": "resolution_document",
            "file_name": "",
            "content_base64": base64_encode(b"bytes"),
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
}

fn base64_encode(bytes: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

// =============================================================================
// SAVE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_save_commits_and_completes_the_stage() {
    let (server, id, _guard) = create_server_with_application().await;

    let save = save_stage(&server, id, fund_position_payload()).await;

    assert!(save.success);
    assert_eq!(save.outcome.as_deref(), Some("committed"));
    assert_eq!(save.stage.as_deref(), Some("fund_position"));

    // Committed fields mirror back into the stage for pre-fill
    let state: ApplicationStateResponse =
        server.get(&format!("/applications/{id}")).await.json();
    let fund = state
        .stages
        .iter()
        .find(|s| s.stage == "fund_position")
        .expect("fund position entry");
    assert!(fund.complete);
    assert!(fund.committed);
    assert_eq!(
        state.position.as_deref(),
        Some("fund_position"),
        "saving never navigates"
    );
}

#[tokio::test]
async fn test_save_payload_for_inactive_stage_is_rejected() {
    let (server, id, _guard) = create_server_with_application().await;

    // ISIN activation is the final stage; fund position is active.
    let response = server
        .post(&format!("/applications/{id}/save"))
        .json(&json!({ "payload": isin_activation_payload() }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let save: SaveResponse = response.json();
    assert!(!save.success);
    assert!(save.error.is_some());
}

#[tokio::test]
async fn test_save_malformed_payload_is_rejected_before_persistence() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server
        .post(&format!("/applications/{id}/save"))
        .json(&json!({
            "payload": {
                "fund_position": {
                    "fund_name": "",
                    "total_aum_minor": 100,
                    "liquid_assets_minor": 50,
                    "as_of_date": "2026-03-31",
                }
            }
        }))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    // Nothing was committed
    let state: ApplicationStateResponse =
        server.get(&format!("/applications/{id}")).await.json();
    assert!(state.stages.iter().all(|s| !s.committed));
}

#[tokio::test]
async fn test_save_unknown_application_returns_404() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/applications/77/save")
        .json(&json!({ "payload": fund_position_payload() }))
        .await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
}

// =============================================================================
// NAVIGATION ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_next_denied_while_stage_incomplete() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server.post(&format!("/applications/{id}/next")).await;

    response.assert_status_ok();
    let nav: NavigateResponse = response.json();
    assert!(nav.success, "a denial is an answered request, not an error");
    assert_eq!(nav.outcome.as_deref(), Some("denied"));
    let notification = nav.notification.expect("denial notification");
    assert_eq!(notification.severity, "warning");
    assert!(notification.message.contains("incomplete"));

    // Position unchanged
    let state: ApplicationStateResponse =
        server.get(&format!("/applications/{id}")).await.json();
    assert_eq!(state.position.as_deref(), Some("fund_position"));
}

#[tokio::test]
async fn test_next_moves_once_stage_is_complete() {
    let (server, id, _guard) = create_server_with_application().await;
    fill_fund_position(&server, id).await;

    let response = server.post(&format!("/applications/{id}/next")).await;

    response.assert_status_ok();
    let nav: NavigateResponse = response.json();
    assert_eq!(nav.outcome.as_deref(), Some("moved"));
    assert_eq!(nav.from.as_deref(), Some("fund_position"));
    assert_eq!(nav.to.as_deref(), Some("collateral_assets"));
}

#[tokio::test]
async fn test_goto_backward_is_unconditional() {
    let (server, id, _guard) = create_server_with_application().await;
    fill_fund_position(&server, id).await;
    server.post(&format!("/applications/{id}/next")).await.assert_status_ok();

    let response = server
        .post(&format!("/applications/{id}/goto"))
        .json(&json!({"stage": "fund_position"}))
        .await;

    response.assert_status_ok();
    let nav: NavigateResponse = response.json();
    assert_eq!(nav.outcome.as_deref(), Some("moved"));
    assert_eq!(nav.to.as_deref(), Some("fund_position"));
}

#[tokio::test]
async fn test_goto_forward_requires_intermediate_completion() {
    let (server, id, _guard) = create_server_with_application().await;
    fill_fund_position(&server, id).await;

    // collateral_assets is still empty, so credit_ratings is gated
    let response = server
        .post(&format!("/applications/{id}/goto"))
        .json(&json!({"stage": "credit_ratings"}))
        .await;

    response.assert_status_ok();
    let nav: NavigateResponse = response.json();
    assert_eq!(nav.outcome.as_deref(), Some("denied"));
    assert!(nav.reason.expect("reason").contains("Collateral Assets"));
}

#[tokio::test]
async fn test_goto_unknown_stage_returns_400() {
    let (server, id, _guard) = create_server_with_application().await;

    let response = server
        .post(&format!("/applications/{id}/goto"))
        .json(&json!({"stage": "underwriting"}))
        .await;

    response.assert_status(axum::http::StatusCode::BAD_REQUEST);
    let nav: NavigateResponse = response.json();
    assert!(!nav.success);
}

#[tokio::test]
async fn test_full_walkthrough_ends_submitted_and_read_only() {
    let (server, id, _guard) = create_server_with_application().await;

    // Work every stage: commit its payload, then explicitly advance.
    let payloads = [
        fund_position_payload(),
        collateral_payload(),
        credit_ratings_payload(),
        signatories_payload(),
        isin_activation_payload(),
    ];
    let mut last_nav = None;
    for payload in payloads {
        let save = save_stage(&server, id, payload).await;
        assert_eq!(save.outcome.as_deref(), Some("committed"));
        let nav: NavigateResponse = server
            .post(&format!("/applications/{id}/next"))
            .await
            .json();
        last_nav = Some(nav);
    }

    let nav = last_nav.expect("navigation outcome");
    assert_eq!(nav.outcome.as_deref(), Some("submitted"));
    assert_eq!(nav.from.as_deref(), Some("isin_activation"));

    let state: ApplicationStateResponse =
        server.get(&format!("/applications/{id}")).await.json();
    assert!(state.submitted);
    assert_eq!(state.position, None);
    assert_eq!(state.overall_basis_points, 10_000);

    // A submitted application rejects further edits
    let response = server
        .put(&format!("/applications/{id}/fields"))
        .json(&json!({
            "stage": "fund_position",
            "sub_form": null,
            "field": "fund_name",
            "value": {"text": {"value": "tamper"}},
        }))
        .await;
    response.assert_status(axum::http::StatusCode::BAD_REQUEST);

    // And further navigation is denied, not an error
    let nav: NavigateResponse = server
        .post(&format!("/applications/{id}/next"))
        .await
        .json();
    assert_eq!(nav.outcome.as_deref(), Some("denied"));
    assert!(nav.reason.expect("reason").contains("submitted"));
}

// =============================================================================
// EXPORT ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_export_returns_data_and_checksum() {
    let (server, id, _guard) = create_server_with_application().await;
    fill_fund_position(&server, id).await;

    let response = server.get(&format!("/applications/{id}/export")).await;

    response.assert_status_ok();
    let export: ExportResponse = response.json();
    assert!(export.success);
    let data = export.data.expect("export data");
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &data)
        .expect("valid base64");
    assert!(!decoded.is_empty());
    assert!(export.checksum.is_some());
}

#[tokio::test]
async fn test_export_is_deterministic() {
    let (server, id, _guard) = create_server_with_application().await;
    fill_fund_position(&server, id).await;

    let first: ExportResponse = server.get(&format!("/applications/{id}/export")).await.json();
    let second: ExportResponse = server.get(&format!("/applications/{id}/export")).await.json();

    assert_eq!(first.data, second.data);
    assert_eq!(first.checksum, second.checksum);
}

#[tokio::test]
async fn test_export_unknown_application_returns_404() {
    let (server, _guard) = create_test_server();

    let response = server.get("/applications/404/export").await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
    let export: ExportResponse = response.json();
    assert!(!export.success);
}

// =============================================================================
// REFERENCE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_reference_lists_are_served() {
    let (server, _guard) = create_test_server();

    for set in [
        "asset_types",
        "charge_types",
        "rating_agencies",
        "rating_outlooks",
        "depositories",
    ] {
        let response = server.get(&format!("/reference/{set}")).await;
        response.assert_status_ok();
        let reference: ReferenceResponse = response.json();
        assert!(reference.success, "{set} must resolve");
        assert_eq!(reference.set.as_deref(), Some(set));
        assert!(!reference.items.is_empty(), "{set} has fallback items");
        for item in &reference.items {
            assert!(!item.code.is_empty());
            assert!(!item.label.is_empty());
        }
    }
}

#[tokio::test]
async fn test_reference_unknown_set_returns_404() {
    let (server, _guard) = create_test_server();

    let response = server.get("/reference/currencies").await;

    response.assert_status(axum::http::StatusCode::NOT_FOUND);
    let reference: ReferenceResponse = response.json();
    assert!(!reference.success);
    assert!(reference.error.is_some());
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

/// Create a test server with authentication enabled.
/// Must be called while holding AUTH_TEST_MUTEX.
fn create_auth_test_server(api_key: &str) -> TestServer {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("TRELLIS_API_KEY", api_key) };
    let store = ApplicationStore::in_memory();
    let state = AppState::new(store);
    let router = create_router(state);
    TestServer::new(router).unwrap()
}

/// Clean up auth env var after test.
fn cleanup_auth_env() {
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("TRELLIS_API_KEY") };
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let api_key = "secret-key-123";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            format!("Bearer {api_key}").parse::<HeaderValue>().unwrap(),
        )
        .await;

    cleanup_auth_env();

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_valid_raw_token() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let api_key = "secret-key-456";
    let server = create_auth_test_server(api_key);

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            api_key.parse::<HeaderValue>().unwrap(),
        )
        .await;

    cleanup_auth_env();

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await;

    cleanup_auth_env();

    assert_eq!(
        response.status_code().as_u16(),
        401,
        "Invalid API key should return 401 Unauthorized"
    );
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    let response = server.get("/status").await;

    cleanup_auth_env();

    assert_eq!(
        response.status_code().as_u16(),
        401,
        "Missing Authorization header should return 401 Unauthorized"
    );
}

#[tokio::test]
async fn test_auth_health_bypasses_authentication() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    // No Authorization header, yet /health must answer
    let response = server.get("/health").await;

    cleanup_auth_env();

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_bearer_prefix_only_rejected() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    // "Bearer " with no key should be rejected
    let response = server
        .get("/status")
        .add_header(
            axum::http::header::AUTHORIZATION,
            "Bearer ".parse::<HeaderValue>().unwrap(),
        )
        .await;

    cleanup_auth_env();

    assert_eq!(
        response.status_code().as_u16(),
        401,
        "Bearer prefix with no key should return 401 Unauthorized"
    );
}

#[tokio::test]
async fn test_auth_reference_catalog_is_public() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    // Reference data is static vocabulary; no key required
    let response = server.get("/reference/depositories").await;

    cleanup_auth_env();

    response.assert_status_ok();
    let reference: ReferenceResponse = response.json();
    assert!(reference.success);
    assert!(!reference.items.is_empty());
}

#[tokio::test]
async fn test_auth_export_stays_authenticated() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    // Read-only but carries applicant data, so the bypass must not cover it
    let response = server.get("/applications/1/export").await;

    cleanup_auth_env();

    assert_eq!(response.status_code().as_u16(), 401);
}

#[tokio::test]
async fn test_auth_rejection_body_uses_response_envelope() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let server = create_auth_test_server("actual-key");

    let response = server.get("/status").await;

    cleanup_auth_env();

    assert_eq!(response.status_code().as_u16(), 401);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].is_string());
}

// =============================================================================
// RATE LIMITING MIDDLEWARE TESTS
// =============================================================================

#[tokio::test]
async fn test_rate_limit_buckets_are_per_application() {
    let _guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe {
        std::env::remove_var("TRELLIS_API_KEY");
        std::env::set_var("TRELLIS_RATE_LIMIT", "2");
    }
    let store = ApplicationStore::in_memory();
    let state = AppState::new(store);
    let server = TestServer::new(create_router(state)).unwrap();

    // Drain application 1's bucket
    let _ = server.get("/applications/1").await;
    let _ = server.get("/applications/1").await;
    let throttled = server.get("/applications/1").await;

    // Another application draws from its own bucket
    let other = server.get("/applications/2").await;

    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::remove_var("TRELLIS_RATE_LIMIT") };

    assert_eq!(
        throttled.status_code().as_u16(),
        429,
        "third request against one application should exhaust its quota"
    );
    let body: serde_json::Value = throttled.json();
    assert_eq!(body["success"], json!(false));

    assert_ne!(
        other.status_code().as_u16(),
        429,
        "other applications must keep their own quota"
    );
}
