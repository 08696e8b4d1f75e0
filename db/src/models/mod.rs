pub mod attendance_credential;
pub mod attendance_record;
pub mod attendance_session;
pub mod user;
