use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Domain errors for the attendance flow. The API layer maps these onto the
/// HTTP status taxonomy; messages are safe to show to callers.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("Malformed attendance credential")]
    MalformedCredential,
    #[error("Invalid or already used credential")]
    InvalidCredential,
    #[error("Credential has expired")]
    ExpiredCredential,
    #[error("Attendance session is closed")]
    SessionClosed,
    #[error("Attendance session not found")]
    SessionNotFound,
    #[error("Member not found")]
    MemberNotFound,
    #[error("Attendance already recorded for this session")]
    AlreadyAttended,
    #[error("Could not allocate an unused attendance code")]
    CodeSpaceExhausted,
    #[error(transparent)]
    Db(#[from] DbErr),
}

/// True when `err` is the store reporting a unique-constraint conflict, which
/// the attendance flow treats as losing a race rather than a failure.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
