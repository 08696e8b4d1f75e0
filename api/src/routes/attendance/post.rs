use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use common::config::Config;

use crate::{auth::AuthUser, response::ApiResponse, state::AppState};
use db::models::{attendance_credential, attendance_record, attendance_session};

use super::common::{
    ApiResult, CredentialResponse, IssueCredentialReq, ManualMarkReq, AttendanceRecordResponse,
    RedeemReq, RedeemResponse, attendance_error_response,
};

/// POST /api/attendance/credentials
///
/// Admin-only. Resolves today's session (creating it on first issuance of
/// the day) and returns a fresh single-use credential with its expiry. The
/// admin shows the code or QR to members out-of-band; nothing is delivered
/// to members by this service.
pub async fn issue_credential(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<IssueCredentialReq>,
) -> ApiResult<CredentialResponse> {
    let db = state.db();
    let now = Utc::now();

    // Sessions are keyed by UTC calendar date everywhere.
    let session = attendance_session::Model::get_or_create(db, now.date_naive())
        .await
        .map_err(|e| attendance_error_response(e.into()))?;

    let ttl = body
        .ttl_seconds
        .unwrap_or(Config::get().credential_ttl_seconds);

    let credential = attendance_credential::Model::issue(db, &session, body.kind, ttl, now)
        .await
        .map_err(attendance_error_response)?;

    tracing::info!(
        admin = claims.sub,
        session_id = session.id,
        kind = %credential.kind,
        "Attendance credential issued"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            CredentialResponse::from(credential),
            "Attendance credential issued",
        )),
    ))
}

/// POST /api/attendance/redeem
///
/// Member-only. Validates the presented secret and, exactly once per member
/// per session, appends to the attendance ledger.
pub async fn redeem(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<RedeemReq>,
) -> ApiResult<RedeemResponse> {
    let record = attendance_record::Model::redeem(state.db(), claims.sub, &body.secret, Utc::now())
        .await
        .map_err(attendance_error_response)?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(
            RedeemResponse::from(record),
            "Attendance recorded",
        )),
    ))
}

/// POST /api/attendance/sessions/{session_id}/records
///
/// Admin-only bypass for members who could not redeem themselves (dead
/// phone, verbal check-in). Subject to the same at-most-once rule.
pub async fn manual_mark(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<ManualMarkReq>,
) -> ApiResult<AttendanceRecordResponse> {
    let record =
        attendance_record::Model::manual_mark(state.db(), body.member_id, session_id, Utc::now())
            .await
            .map_err(attendance_error_response)?;

    tracing::info!(
        admin = claims.sub,
        member_id = body.member_id,
        session_id,
        "Attendance marked manually"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            AttendanceRecordResponse::from(record),
            "Attendance recorded manually",
        )),
    ))
}
