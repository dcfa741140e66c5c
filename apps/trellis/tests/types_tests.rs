//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use trellis::api::{
    ApplicationStateResponse, ClearFieldRequest, CreatedResponse, DeletedResponse, ExportResponse,
    FieldResponse, HealthResponse, ListResponse, NavigateRequest, NavigateResponse,
    ReferenceResponse, RejectionResponse, SaveRequest, SaveResponse, SetFieldRequest,
    StageStateJson, StatusResponse, UploadRequest, UploadResponse,
};
use trellis_core::{
    CompletionSignal, DenialReason, FieldValue, FileRef, NavigationOutcome, ReferenceItem,
    ReferenceSet, SaveOutcome, Stage, StagePayload, TrellisError,
};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_health_response_serialization() {
    let health = HealthResponse {
        status: "ok".to_string(),
        version: "0.4.2".to_string(),
    };

    let json = serde_json::to_string(&health).unwrap();
    assert!(json.contains("\"status\":\"ok\""));
    assert!(json.contains("\"version\":\"0.4.2\""));
}

#[test]
fn test_health_response_deserialization() {
    let json = r#"{"status":"healthy","version":"1.0.0"}"#;
    let health: HealthResponse = serde_json::from_str(json).unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "1.0.0");
}

// =============================================================================
// STATUS RESPONSE TESTS
// =============================================================================

#[test]
fn test_status_response_serialization() {
    let status = StatusResponse {
        application_count: 12,
        persistent: true,
    };

    let json = serde_json::to_string(&status).unwrap();
    assert!(json.contains("\"application_count\":12"));
    assert!(json.contains("\"persistent\":true"));
}

#[test]
fn test_status_response_deserialization() {
    let json = r#"{"application_count":3,"persistent":false}"#;
    let status: StatusResponse = serde_json::from_str(json).unwrap();

    assert_eq!(status.application_count, 3);
    assert!(!status.persistent);
}

// =============================================================================
// LIFECYCLE RESPONSE TESTS
// =============================================================================

#[test]
fn test_created_response_constructors() {
    let ok = CreatedResponse::success(7);
    assert!(ok.success);
    assert_eq!(ok.application_id, Some(7));
    assert!(ok.error.is_none());

    let err = CreatedResponse::error("store unavailable");
    assert!(!err.success);
    assert_eq!(err.application_id, None);
    assert_eq!(err.error.as_deref(), Some("store unavailable"));
}

#[test]
fn test_list_response_constructors() {
    let ok = ListResponse::success(vec![1, 2, 3]);
    assert!(ok.success);
    assert_eq!(ok.applications, vec![1, 2, 3]);

    let err = ListResponse::error("boom");
    assert!(!err.success);
    assert!(err.applications.is_empty());
}

#[test]
fn test_deleted_response_constructors() {
    assert!(DeletedResponse::success().success);
    let err = DeletedResponse::error("not found");
    assert!(!err.success);
    assert_eq!(err.error.as_deref(), Some("not found"));
}

// =============================================================================
// STAGE STATE JSON TESTS
// =============================================================================

#[test]
fn test_stage_state_json_serialization() {
    let stage = StageStateJson {
        stage: "fund_position".to_string(),
        title: "Fund Position".to_string(),
        basis_points: 7_500,
        complete: false,
        committed: true,
    };

    let json = serde_json::to_string(&stage).unwrap();
    assert!(json.contains("\"stage\":\"fund_position\""));
    assert!(json.contains("\"basis_points\":7500"));
    assert!(json.contains("\"complete\":false"));
    assert!(json.contains("\"committed\":true"));
}

#[test]
fn test_application_state_error_shape() {
    let state = ApplicationStateResponse::error(9, "Application 9 not found");

    assert!(!state.success);
    assert_eq!(state.application_id, 9);
    assert_eq!(state.overall_percent, "0.00%");
    assert!(state.stages.is_empty());
    assert!(state.error.is_some());
}

// =============================================================================
// FIELD REQUEST TESTS
// =============================================================================

#[test]
fn test_set_field_request_resolves_subform_from_blueprint() {
    let request = SetFieldRequest {
        stage: "fund_position".to_string(),
        sub_form: None,
        field: "fund_name".to_string(),
        value: FieldValue::text("Meridian"),
    };

    let (stage, subform, field) = request.parts().unwrap();
    assert_eq!(stage, Stage::FundPosition);
    assert_eq!(subform.as_str(), "fund_position");
    assert_eq!(field.as_str(), "fund_name");
}

#[test]
fn test_set_field_request_explicit_subform_wins() {
    let request = SetFieldRequest {
        stage: "collateral_assets".to_string(),
        sub_form: Some("charge_details".to_string()),
        field: "charge_type".to_string(),
        value: FieldValue::text("exclusive_charge"),
    };

    let (stage, subform, _) = request.parts().unwrap();
    assert_eq!(stage, Stage::CollateralAssets);
    assert_eq!(subform.as_str(), "charge_details");
}

#[test]
fn test_set_field_request_unknown_stage_rejected() {
    let request = SetFieldRequest {
        stage: "underwriting".to_string(),
        sub_form: None,
        field: "fund_name".to_string(),
        value: FieldValue::text("x"),
    };

    assert!(matches!(
        request.parts(),
        Err(TrellisError::UnknownStage(_))
    ));
}

#[test]
fn test_set_field_request_unroutable_field_rejected() {
    let request = SetFieldRequest {
        stage: "fund_position".to_string(),
        sub_form: None,
        field: "nonexistent".to_string(),
        value: FieldValue::text("x"),
    };

    assert!(matches!(request.parts(), Err(TrellisError::Validation(_))));
}

#[test]
fn test_set_field_request_empty_field_rejected() {
    let request = SetFieldRequest {
        stage: "fund_position".to_string(),
        sub_form: Some("fund_position".to_string()),
        field: String::new(),
        value: FieldValue::text("x"),
    };

    assert!(matches!(request.parts(), Err(TrellisError::Validation(_))));
}

#[test]
fn test_set_field_request_overlong_field_rejected() {
    let request = SetFieldRequest {
        stage: "fund_position".to_string(),
        sub_form: Some("fund_position".to_string()),
        field: "f".repeat(257),
        value: FieldValue::text("x"),
    };

    assert!(matches!(request.parts(), Err(TrellisError::Validation(_))));
}

#[test]
fn test_set_field_request_json_value_shapes() {
    // The tagged FieldValue forms a client actually sends
    let json = r#"{
        "stage": "fund_position",
        "sub_form": null,
        "field": "total_aum",
        "value": {"number": {"value": 0}}
    }"#;
    let request: SetFieldRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.value, FieldValue::number(0));

    let json = r#"{
        "stage": "fund_position",
        "sub_form": null,
        "field": "fund_name",
        "value": "empty"
    }"#;
    let request: SetFieldRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.value, FieldValue::Empty);
}

#[test]
fn test_clear_field_request_parts() {
    let request = ClearFieldRequest {
        stage: "signatories".to_string(),
        sub_form: None,
        field: "resolution_date".to_string(),
    };

    let (stage, subform, field) = request.parts().unwrap();
    assert_eq!(stage, Stage::Signatories);
    assert_eq!(subform.as_str(), "board_resolution");
    assert_eq!(field.as_str(), "resolution_date");
}

#[test]
fn test_field_response_constructors() {
    let ok = FieldResponse::success(
        Stage::FundPosition,
        CompletionSignal::from_basis_points(7_500),
        Some("reopened".to_string()),
    );
    assert!(ok.success);
    assert_eq!(ok.stage.as_deref(), Some("fund_position"));
    assert_eq!(ok.stage_basis_points, 7_500);
    assert!(!ok.stage_complete);
    assert_eq!(ok.transition.as_deref(), Some("reopened"));

    let err = FieldResponse::error("bad address");
    assert!(!err.success);
    assert_eq!(err.stage, None);
    assert_eq!(err.stage_basis_points, 0);
}

// =============================================================================
// UPLOAD REQUEST/RESPONSE TESTS
// =============================================================================

fn upload_request(file_name: &str, content_base64: &str) -> UploadRequest {
    UploadRequest {
        stage: "signatories".to_string(),
        sub_form: None,
        field: "resolution_document".to_string(),
        file_name: file_name.to_string(),
        content_base64: content_base64.to_string(),
    }
}

#[test]
fn test_upload_request_decodes_valid_base64() {
    let encoded =
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"resolution");
    let request = upload_request("resolution.pdf", &encoded);

    let content = request.decode_content().unwrap();
    assert_eq!(content, b"resolution");

    let (stage, subform, field) = request.parts().unwrap();
    assert_eq!(stage, Stage::Signatories);
    assert_eq!(subform.as_str(), "board_resolution");
    assert_eq!(field.as_str(), "resolution_document");
}

#[test]
fn test_upload_request_rejects_invalid_base64() {
    let request = upload_request("resolution.pdf", "@@not-base64@@");
    assert!(matches!(
        request.decode_content(),
        Err(TrellisError::Upload(_))
    ));
}

#[test]
fn test_upload_request_rejects_empty_content() {
    let request = upload_request("resolution.pdf", "");
    assert!(matches!(
        request.decode_content(),
        Err(TrellisError::Upload(_))
    ));
}

#[test]
fn test_upload_request_rejects_empty_file_name() {
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"bytes");
    let request = upload_request("", &encoded);
    assert!(matches!(
        request.decode_content(),
        Err(TrellisError::Upload(_))
    ));
}

#[test]
fn test_upload_request_rejects_oversized_content() {
    // Just past the 1 MB decoded cap
    let oversized = vec![0u8; 1024 * 1024 + 1];
    let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &oversized);
    let request = upload_request("big.pdf", &encoded);
    assert!(matches!(
        request.decode_content(),
        Err(TrellisError::Upload(_))
    ));
}

#[test]
fn test_upload_response_success_shape() {
    let file = FileRef::new("file-abc123", "/files/file-abc123", "resolution.pdf");
    let response = UploadResponse::success(&file, CompletionSignal::from_basis_points(2_500));

    assert!(response.success);
    assert_eq!(response.file_id.as_deref(), Some("file-abc123"));
    assert_eq!(response.url.as_deref(), Some("/files/file-abc123"));
    assert_eq!(response.original_name.as_deref(), Some("resolution.pdf"));
    assert_eq!(response.stage_basis_points, 2_500);
    assert!(!response.stage_complete);
}

// =============================================================================
// SAVE REQUEST/RESPONSE TESTS
// =============================================================================

#[test]
fn test_save_request_deserializes_tagged_payload() {
    let json = r#"{
        "payload": {
            "isin_activation": {
                "isin_code": "INE123A07015",
                "activation_date": "2026-04-01",
                "depository": "nsdl"
            }
        }
    }"#;
    let request: SaveRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.payload.stage(), Stage::IsinActivation);

    match request.payload {
        StagePayload::IsinActivation(details) => {
            assert_eq!(details.isin_code, "INE123A07015");
            assert_eq!(details.depository, "nsdl");
        }
        other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn test_save_response_from_committed_outcome() {
    let outcome = SaveOutcome::Committed {
        stage: Stage::FundPosition,
        message: "Fund Position saved".to_string(),
        event: None,
    };

    let response = SaveResponse::from_outcome(&outcome);
    assert!(response.success);
    assert_eq!(response.outcome.as_deref(), Some("committed"));
    assert_eq!(response.stage.as_deref(), Some("fund_position"));
    assert_eq!(response.message.as_deref(), Some("Fund Position saved"));
    assert!(response.error.is_none());
}

#[test]
fn test_save_response_from_failed_outcome() {
    let outcome = SaveOutcome::Failed {
        stage: Stage::CreditRatings,
        error: TrellisError::Persistence("backend down".to_string()),
    };

    let response = SaveResponse::from_outcome(&outcome);
    assert!(!response.success);
    assert_eq!(response.outcome.as_deref(), Some("failed"));
    assert_eq!(response.stage.as_deref(), Some("credit_ratings"));
    assert!(response.error.unwrap().contains("backend down"));
}

#[test]
fn test_save_response_from_stale_outcome() {
    let outcome = SaveOutcome::Stale {
        stage: Stage::Signatories,
    };

    let response = SaveResponse::from_outcome(&outcome);
    assert!(response.success, "a stale save is a discarded non-event");
    assert_eq!(response.outcome.as_deref(), Some("stale"));
    assert_eq!(response.stage.as_deref(), Some("signatories"));
}

// =============================================================================
// NAVIGATION REQUEST/RESPONSE TESTS
// =============================================================================

#[test]
fn test_navigate_request_deserialization() {
    let json = r#"{"stage":"collateral_assets"}"#;
    let request: NavigateRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.stage, "collateral_assets");
}

#[test]
fn test_navigate_response_from_moved_outcome() {
    let outcome = NavigationOutcome::Moved {
        from: Stage::FundPosition,
        to: Stage::CollateralAssets,
    };

    let response = NavigateResponse::from_outcome(&outcome);
    assert!(response.success);
    assert_eq!(response.outcome.as_deref(), Some("moved"));
    assert_eq!(response.from.as_deref(), Some("fund_position"));
    assert_eq!(response.to.as_deref(), Some("collateral_assets"));
    assert!(response.notification.is_none(), "moves are silent");
}

#[test]
fn test_navigate_response_from_submitted_outcome() {
    let outcome = NavigationOutcome::Submitted {
        from: Stage::IsinActivation,
    };

    let response = NavigateResponse::from_outcome(&outcome);
    assert!(response.success);
    assert_eq!(response.outcome.as_deref(), Some("submitted"));
    assert_eq!(response.from.as_deref(), Some("isin_activation"));
    assert_eq!(response.to, None);
    let notification = response.notification.unwrap();
    assert_eq!(notification.severity, "info");
}

#[test]
fn test_navigate_response_from_denied_outcome() {
    let outcome = NavigationOutcome::Denied {
        reason: DenialReason::StageIncomplete {
            stage: Stage::FundPosition,
        },
    };

    let response = NavigateResponse::from_outcome(&outcome);
    assert!(response.success, "a denial is an answer, not an error");
    assert_eq!(response.outcome.as_deref(), Some("denied"));
    let reason = response.reason.unwrap();
    assert!(reason.contains("Step 1: Fund Position"));
    let notification = response.notification.unwrap();
    assert_eq!(notification.severity, "warning");
}

// =============================================================================
// REFERENCE RESPONSE TESTS
// =============================================================================

#[test]
fn test_reference_response_success_shape() {
    let items = vec![
        ReferenceItem::new("nsdl", "National Securities Depository"),
        ReferenceItem::new("cdsl", "Central Depository Services"),
    ];

    let response = ReferenceResponse::success(ReferenceSet::Depositories, &items);
    assert!(response.success);
    assert_eq!(response.set.as_deref(), Some("depositories"));
    assert_eq!(response.items.len(), 2);
    assert_eq!(response.items[0].code, "nsdl");
    assert_eq!(response.items[1].label, "Central Depository Services");
}

#[test]
fn test_reference_response_error_shape() {
    let response = ReferenceResponse::error("Unknown reference set: currencies");
    assert!(!response.success);
    assert_eq!(response.set, None);
    assert!(response.items.is_empty());
}

// =============================================================================
// REJECTION RESPONSE TESTS
// =============================================================================

#[test]
fn test_rejection_response_matches_envelope() {
    let rejection = RejectionResponse::error("Unauthorized");

    assert!(!rejection.success);
    let json = serde_json::to_string(&rejection).unwrap();
    assert!(json.contains("\"success\":false"));
    assert!(json.contains("\"error\":\"Unauthorized\""));
}

// =============================================================================
// EXPORT RESPONSE TESTS
// =============================================================================

#[test]
fn test_export_response_base64_encodes_data() {
    let response = ExportResponse::success(b"canonical bytes".to_vec(), 42);

    assert!(response.success);
    assert_eq!(response.checksum, Some(42));
    let data = response.data.unwrap();
    let decoded =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &data).unwrap();
    assert_eq!(decoded, b"canonical bytes");
}

#[test]
fn test_export_response_error_shape() {
    let response = ExportResponse::error("Application 9 not found");
    assert!(!response.success);
    assert_eq!(response.data, None);
    assert_eq!(response.checksum, None);
}
