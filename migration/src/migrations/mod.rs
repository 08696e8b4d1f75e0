pub mod m202607190001_create_users;
pub mod m202607190002_create_attendance_sessions;
pub mod m202607190003_create_attendance_credentials;
pub mod m202607190004_create_attendance_records;
