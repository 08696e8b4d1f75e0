use axum::{Json, http::StatusCode};
use db::AttendanceError;
use db::models::attendance_credential::{self, CredentialKind};
use db::models::{attendance_record, attendance_session};
use serde::{Deserialize, Serialize};

use crate::auth::guards::Empty;
use crate::response::ApiResponse;

/// Error half of every attendance handler: status code plus the standard
/// envelope with empty data.
pub type ApiError = (StatusCode, Json<ApiResponse<Empty>>);
pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

#[derive(Debug, Deserialize)]
pub struct IssueCredentialReq {
    pub kind: CredentialKind,
    /// Clamped into the configured TTL policy range; defaults when omitted.
    pub ttl_seconds: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemReq {
    pub secret: String,
}

#[derive(Debug, Deserialize)]
pub struct ManualMarkReq {
    pub member_id: i64,
}

#[derive(Debug, Serialize)]
pub struct CredentialResponse {
    pub id: i64,
    pub kind: CredentialKind,
    pub secret: String,
    pub session_id: i64,
    pub issued_at: String,
    pub expires_at: String,
}

impl From<attendance_credential::Model> for CredentialResponse {
    fn from(m: attendance_credential::Model) -> Self {
        Self {
            id: m.id,
            kind: m.kind,
            secret: m.secret,
            session_id: m.session_id,
            issued_at: m.issued_at.to_rfc3339(),
            expires_at: m.expires_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttendanceRecordResponse {
    pub id: i64,
    pub member_id: i64,
    pub session_id: i64,
    pub method: attendance_record::Method,
    pub taken_at: String,
}

impl From<attendance_record::Model> for AttendanceRecordResponse {
    fn from(m: attendance_record::Model) -> Self {
        Self {
            id: m.id,
            member_id: m.member_id,
            session_id: m.session_id,
            method: m.method,
            taken_at: m.taken_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub attendance_id: i64,
    pub session_id: i64,
    pub method: attendance_record::Method,
    pub taken_at: String,
}

impl From<attendance_record::Model> for RedeemResponse {
    fn from(m: attendance_record::Model) -> Self {
        Self {
            attendance_id: m.id,
            session_id: m.session_id,
            method: m.method,
            taken_at: m.taken_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub session_date: String,
    pub description: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub attended_count: i64,
}

impl From<attendance_session::Model> for SessionResponse {
    fn from(m: attendance_session::Model) -> Self {
        Self {
            id: m.id,
            session_date: m.session_date.to_string(),
            description: m.description,
            active: m.active,
            created_at: m.created_at.to_rfc3339(),
            updated_at: m.updated_at.to_rfc3339(),
            attended_count: 0,
        }
    }
}

impl SessionResponse {
    pub fn from_with_count(m: attendance_session::Model, attended_count: i64) -> Self {
        let mut base = Self::from(m);
        base.attended_count = attended_count;
        base
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
    pub active: Option<bool>, // filter by current status
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub sessions: Vec<SessionResponse>,
    pub page: i32,
    pub per_page: i32,
    pub total: i32,
}

#[derive(Debug, Serialize)]
pub struct TodayResponse {
    pub attended: bool,
    pub session_id: Option<i64>,
}

/// Maps a domain error onto the HTTP taxonomy. Store failures are logged
/// here and surface as a generic 500.
pub fn attendance_error_response(err: AttendanceError) -> ApiError {
    let status = match &err {
        AttendanceError::MalformedCredential
        | AttendanceError::InvalidCredential
        | AttendanceError::ExpiredCredential => StatusCode::BAD_REQUEST,
        AttendanceError::SessionClosed | AttendanceError::AlreadyAttended => StatusCode::CONFLICT,
        AttendanceError::SessionNotFound | AttendanceError::MemberNotFound => StatusCode::NOT_FOUND,
        AttendanceError::CodeSpaceExhausted | AttendanceError::Db(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Attendance operation failed");
        return (status, Json(ApiResponse::error("Internal server error")));
    }

    (status, Json(ApiResponse::error(err.to_string())))
}

pub fn session_not_found() -> ApiError {
    attendance_error_response(AttendanceError::SessionNotFound)
}
