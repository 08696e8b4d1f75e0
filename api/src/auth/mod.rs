pub mod claims;
pub mod extractors;
pub mod guards;
pub mod middleware;

pub use claims::{AuthUser, Claims};

use chrono::{Duration, Utc};
use common::config::Config;
use db::models::user::Role;
use jsonwebtoken::{EncodingKey, Header, encode};

/// Generates a bearer token and its expiry timestamp for a given user.
///
/// Token issuance for real members belongs to the identity collaborator;
/// this helper exists for tests and operational tooling.
pub fn generate_jwt(user_id: i64, role: Role) -> (String, String) {
    let cfg = Config::get();
    let expiry = Utc::now() + Duration::minutes(cfg.jwt_duration_minutes);

    let claims = Claims {
        sub: user_id,
        role,
        exp: expiry.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
    )
    .expect("Token encoding failed");

    (token, expiry.to_rfc3339())
}
