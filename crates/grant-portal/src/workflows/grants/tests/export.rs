use chrono::NaiveDate;
use serde_json::Value;

use super::common::*;
use crate::workflows::grants::domain::EligibilityFlags;
use crate::workflows::grants::export::{ExportError, ExportFilters, ExportRequest};
use crate::workflows::grants::service::PortalServiceError;

fn request(kind: &str, format: &str) -> ExportRequest {
    ExportRequest {
        kind: kind.to_string(),
        format: format.to_string(),
        filters: ExportFilters::default(),
    }
}

fn generated_on() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).expect("valid date")
}

fn seeded() -> Harness {
    let harness = harness();
    let applicant = signed_in(&harness, APPLICANT);
    let application = harness
        .service
        .submit(&applicant, submission())
        .expect("submission");

    let reviewer = signed_in(&harness, REVIEWER_TWO);
    harness
        .service
        .update_eligibility_flags(
            &reviewer,
            &application.id,
            EligibilityFlags {
                age: true,
                registration: true,
                revenue: true,
                business_plan: true,
                impact: true,
            },
        )
        .expect("flags");
    harness
        .service
        .save_scoring_progress(&reviewer, &application.id, passing_scores())
        .expect("scores");
    harness
        .service
        .lock_result(&reviewer, &application.id)
        .expect("lock");
    harness
}

#[test]
fn json_export_names_file_by_kind_and_date() {
    let harness = seeded();
    let file = harness
        .service
        .export(&request("applications", "json"), generated_on())
        .expect("export");

    assert_eq!(file.filename, "applications-20250314.json");
    assert_eq!(file.content_type, "application/json");

    let rows: Value = serde_json::from_slice(&file.bytes).expect("json");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["business_name"], "Mavuno Agritech");
    assert_eq!(rows[0]["track"], "acceleration");
    assert_eq!(rows[0]["status"], "under_review");
}

#[test]
fn eligibility_export_carries_flags_and_lock_state() {
    let harness = seeded();
    let file = harness
        .service
        .export(&request("eligibility", "csv"), generated_on())
        .expect("export");

    let text = String::from_utf8(file.bytes).expect("utf8");
    let mut lines = text.lines();
    assert_eq!(
        lines.next(),
        Some("application_id,business_name,age,registration,revenue,business_plan,impact,total_score,is_eligible,is_locked")
    );
    let row = lines.next().expect("one result row");
    assert!(row.ends_with(",Mavuno Agritech,true,true,true,true,true,72,true,true"));
    assert_eq!(lines.next(), None);
}

#[test]
fn applicants_export_includes_accounts_without_applications() {
    let harness = seeded();
    let file = harness
        .service
        .export(&request("applicants", "csv"), generated_on())
        .expect("export");

    let text = String::from_utf8(file.bytes).expect("utf8");
    // header plus both seeded applicants; staff accounts are excluded
    assert_eq!(text.lines().count(), 3);
    assert!(text.contains(&format!("{SECOND_APPLICANT},")));
    assert!(!text.contains(REVIEWER_ONE));
}

#[test]
fn filtered_applicant_export_skips_accounts_without_matches() {
    let harness = seeded();
    let mut filtered = request("applicants", "csv");
    filtered.filters.track = Some("acceleration".to_string());

    let file = harness
        .service
        .export(&filtered, generated_on())
        .expect("export");
    let text = String::from_utf8(file.bytes).expect("utf8");
    assert_eq!(text.lines().count(), 2);
    assert!(!text.contains(SECOND_APPLICANT));
}

#[test]
fn status_filter_narrows_rows() {
    let harness = seeded();
    let mut filtered = request("applications", "json");
    filtered.filters.status = Some("approved".to_string());

    let file = harness
        .service
        .export(&filtered, generated_on())
        .expect("export");
    let rows: Value = serde_json::from_slice(&file.bytes).expect("json");
    assert_eq!(rows.as_array().map(Vec::len), Some(0));
}

#[test]
fn xlsx_export_produces_a_workbook() {
    let harness = seeded();
    let file = harness
        .service
        .export(&request("applications", "XLSX"), generated_on())
        .expect("export");

    assert_eq!(file.filename, "applications-20250314.xlsx");
    assert_eq!(
        file.content_type,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    // xlsx is a zip container
    assert!(file.bytes.starts_with(b"PK"));
}

#[test]
fn unsupported_requests_are_client_errors() {
    let harness = seeded();

    for (kind, format) in [("reviews", "csv"), ("applications", "pdf")] {
        match harness.service.export(&request(kind, format), generated_on()) {
            Err(PortalServiceError::Export(err)) => assert!(err.is_client_error(), "{err}"),
            other => panic!("expected export error, got {other:?}"),
        }
    }

    let mut bad_filter = request("applications", "csv");
    bad_filter.filters.status = Some("pending".to_string());
    match harness.service.export(&bad_filter, generated_on()) {
        Err(PortalServiceError::Export(ExportError::InvalidFilter { field, value })) => {
            assert_eq!(field, "status");
            assert_eq!(value, "pending");
        }
        other => panic!("expected invalid filter, got {other:?}"),
    }
}
