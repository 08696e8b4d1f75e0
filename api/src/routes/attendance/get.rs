//! Attendance read-only routes: the member-facing ledger views and the
//! admin session listing.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

use crate::{auth::AuthUser, response::ApiResponse, state::AppState};
use db::models::attendance_session::{Column as SessionCol, Entity as SessionEntity};
use db::models::{attendance_record, attendance_session};

use super::common::{
    ApiResult, AttendanceRecordResponse, ListQuery, ListResponse, SessionResponse, TodayResponse,
    attendance_error_response, session_not_found,
};

/// GET /api/attendance/me
///
/// The caller's attendance history, newest first.
pub async fn my_attendance(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<Vec<AttendanceRecordResponse>> {
    let records = attendance_record::Model::for_member(state.db(), claims.sub)
        .await
        .map_err(|e| attendance_error_response(e.into()))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(
            records.into_iter().map(AttendanceRecordResponse::from).collect(),
            "Attendance history retrieved",
        )),
    ))
}

/// GET /api/attendance/me/today
///
/// Whether the caller has already checked in for today's session.
pub async fn my_attendance_today(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<TodayResponse> {
    let session_id = attendance_record::Model::attended_session_on(
        state.db(),
        claims.sub,
        Utc::now().date_naive(),
    )
    .await
    .map_err(|e| attendance_error_response(e.into()))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(
            TodayResponse {
                attended: session_id.is_some(),
                session_id,
            },
            "Attendance status retrieved",
        )),
    ))
}

/// GET /api/attendance/sessions
///
/// Admin listing of sessions, newest date first, with per-session attendance
/// counts.
///
/// **Query**:
/// - `active` *(optional bool)*
/// - `page` *(default 1)*
/// - `per_page` *(default 20, max 100)*
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> ApiResult<ListResponse> {
    let db = state.db();
    let page = q.page.unwrap_or(1).max(1) as u64;
    let per_page = q.per_page.unwrap_or(20).clamp(1, 100) as u64;

    let mut sel = SessionEntity::find().order_by_desc(SessionCol::SessionDate);
    if let Some(active) = q.active {
        sel = sel.filter(SessionCol::Active.eq(active));
    }

    let paginator = sel.paginate(db, per_page);
    let total = paginator
        .num_items()
        .await
        .map_err(|e| attendance_error_response(e.into()))? as i32;
    let rows = paginator
        .fetch_page(page.saturating_sub(1))
        .await
        .map_err(|e| attendance_error_response(e.into()))?;

    let session_ids: Vec<i64> = rows.iter().map(|s| s.id).collect();
    let counts = attendance_record::Model::counts_for_sessions(db, &session_ids)
        .await
        .map_err(|e| attendance_error_response(e.into()))?;

    let resp = ListResponse {
        sessions: rows
            .into_iter()
            .map(|s| {
                let attended = counts.get(&s.id).copied().unwrap_or(0);
                SessionResponse::from_with_count(s, attended)
            })
            .collect(),
        page: page as i32,
        per_page: per_page as i32,
        total,
    };

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(resp, "Attendance sessions retrieved")),
    ))
}

/// GET /api/attendance/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<SessionResponse> {
    let db = state.db();

    let session = attendance_session::Model::find_by_id(db, session_id)
        .await
        .map_err(|e| attendance_error_response(e.into()))?
        .ok_or_else(session_not_found)?;

    let counts = attendance_record::Model::counts_for_sessions(db, &[session_id])
        .await
        .map_err(|e| attendance_error_response(e.into()))?;
    let attended = counts.get(&session_id).copied().unwrap_or(0);

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(
            SessionResponse::from_with_count(session, attended),
            "Attendance session retrieved",
        )),
    ))
}

/// GET /api/attendance/sessions/{session_id}/records
///
/// Every check-in for one session, in arrival order.
pub async fn list_session_records(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> ApiResult<Vec<AttendanceRecordResponse>> {
    let db = state.db();

    attendance_session::Model::find_by_id(db, session_id)
        .await
        .map_err(|e| attendance_error_response(e.into()))?
        .ok_or_else(session_not_found)?;

    let records = attendance_record::Model::for_session(db, session_id)
        .await
        .map_err(|e| attendance_error_response(e.into()))?;

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(
            records.into_iter().map(AttendanceRecordResponse::from).collect(),
            "Attendance records retrieved",
        )),
    ))
}
