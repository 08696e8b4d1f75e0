use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{auth::AuthUser, response::ApiResponse, state::AppState};
use db::models::attendance_session;

use super::common::{ApiResult, SessionResponse, attendance_error_response, session_not_found};

/// PUT /api/attendance/sessions/{session_id}/close
///
/// Flips the session inactive. A closed session accepts no further
/// issuance or redemption; records already taken stay in the ledger.
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> ApiResult<SessionResponse> {
    let db = state.db();

    let session = attendance_session::Model::find_by_id(db, session_id)
        .await
        .map_err(|e| attendance_error_response(e.into()))?
        .ok_or_else(session_not_found)?;

    let closed = session
        .close(db)
        .await
        .map_err(|e| attendance_error_response(e.into()))?;

    tracing::info!(admin = claims.sub, session_id, "Attendance session closed");

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(
            SessionResponse::from(closed),
            "Attendance session closed",
        )),
    ))
}
