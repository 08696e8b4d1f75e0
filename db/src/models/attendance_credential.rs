use chrono::{DateTime, Duration, Utc};
use common::config::Config;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{PaginatorTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::AttendanceError;
use crate::models::attendance_session;

/// A single-use proof of presence, handed to members out-of-band and
/// redeemed at most once.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_credentials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub kind: CredentialKind,
    /// The 4-digit code itself, or the signed QR pass.
    pub secret: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Flips false to true exactly once; the flip is the redemption
    /// serialization point.
    pub used: bool,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "credential_kind_type")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CredentialKind {
    /// Human-typed short numeric code.
    #[sea_orm(string_value = "code")]
    Code,
    /// Machine-scanned signed pass.
    #[sea_orm(string_value = "qr")]
    Qr,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Session,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

const SHORT_CODE_DIGITS: usize = 4;
const WIDE_CODE_DIGITS: usize = 6;
const CODE_ATTEMPTS_PER_WIDTH: usize = 10;

/// Payload of a QR pass: the signature binds the owning session and the
/// validity window, so a scanner can be authenticated independently of the
/// store lookup that enforces single use.
#[derive(Debug, Serialize, Deserialize)]
struct PassClaims {
    sid: i64,
    jti: String,
    iat: usize,
    exp: usize,
}

impl Model {
    /// Creates and persists a credential for `session`.
    ///
    /// `ttl_seconds` is clamped into the configured policy range; issuing
    /// into a closed session is refused rather than silently reopened.
    pub async fn issue(
        db: &DatabaseConnection,
        session: &attendance_session::Model,
        kind: CredentialKind,
        ttl_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, AttendanceError> {
        if !session.active {
            return Err(AttendanceError::SessionClosed);
        }

        let cfg = Config::get();
        let ttl = ttl_seconds.clamp(cfg.credential_ttl_min_seconds, cfg.credential_ttl_max_seconds);
        let expires_at = now + Duration::seconds(ttl);

        let secret = match kind {
            CredentialKind::Code => Self::allocate_code(db, now).await?,
            CredentialKind::Qr => sign_pass(session.id, now, expires_at)?,
        };

        let credential = ActiveModel {
            id: NotSet,
            session_id: Set(session.id),
            kind: Set(kind),
            secret: Set(secret),
            issued_at: Set(now),
            expires_at: Set(expires_at),
            used: Set(false),
        };
        Ok(credential.insert(db).await?)
    }

    /// Picks a numeric code not currently held by any unused, unexpired
    /// credential. Retries are bounded; the code widens to six digits before
    /// giving up entirely.
    async fn allocate_code(
        db: &DatabaseConnection,
        now: DateTime<Utc>,
    ) -> Result<String, AttendanceError> {
        for digits in [SHORT_CODE_DIGITS, WIDE_CODE_DIGITS] {
            let modulus = 10u32.pow(digits as u32);
            for _ in 0..CODE_ATTEMPTS_PER_WIDTH {
                let n = rand::thread_rng().gen_range(0..modulus);
                let code = format!("{n:0width$}", width = digits);
                if !Self::code_in_use(db, &code, now).await? {
                    return Ok(code);
                }
            }
        }
        Err(AttendanceError::CodeSpaceExhausted)
    }

    /// True while some unused, unexpired credential already carries `secret`.
    pub async fn code_in_use(
        db: &DatabaseConnection,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let hits = Entity::find()
            .filter(Column::Secret.eq(secret))
            .filter(Column::Used.eq(false))
            .filter(Column::ExpiresAt.gt(now))
            .count(db)
            .await?;
        Ok(hits > 0)
    }

    /// Classifies a presented secret without touching the store. `None`
    /// means the input matches neither credential shape.
    pub fn kind_of_secret(secret: &str) -> Option<CredentialKind> {
        let is_numeric = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
        if (secret.len() == SHORT_CODE_DIGITS || secret.len() == WIDE_CODE_DIGITS)
            && is_numeric(secret)
        {
            return Some(CredentialKind::Code);
        }
        let mut segments = secret.split('.');
        if segments.clone().count() == 3 && segments.all(|s| !s.is_empty()) {
            return Some(CredentialKind::Qr);
        }
        None
    }

    /// Newest unused credential carrying `secret`. Dead (expired, unused)
    /// credentials are retained and may collide with a freshly issued code,
    /// so the lookup prefers the row with the latest validity window.
    pub async fn find_unused_by_secret(
        db: &DatabaseConnection,
        secret: &str,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::Secret.eq(secret))
            .filter(Column::Used.eq(false))
            .order_by_desc(Column::ExpiresAt)
            .one(db)
            .await
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Verifies the pass signature and its session binding. Always false for
    /// short codes, which carry no authenticity of their own.
    pub fn verify_pass(&self) -> bool {
        if self.kind != CredentialKind::Qr {
            return false;
        }
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced against the stored row so the caller can report
        // it distinctly; the signature check is authenticity only.
        validation.validate_exp = false;
        decode::<PassClaims>(
            &self.secret,
            &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims.sid == self.session_id)
        .unwrap_or(false)
    }

    /// Atomically flips `used` from false to true. Returns false when another
    /// redemption won the flip first (or the credential was never unused).
    pub async fn consume(db: &DatabaseConnection, id: i64) -> Result<bool, DbErr> {
        let result = Entity::update_many()
            .col_expr(Column::Used, Expr::value(true))
            .filter(Column::Id.eq(id))
            .filter(Column::Used.eq(false))
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Deletes credentials whose expiry passed more than the configured
    /// grace period ago. Hygiene only; correctness never depends on it.
    pub async fn purge_expired(db: &DatabaseConnection, now: DateTime<Utc>) -> Result<u64, DbErr> {
        let cutoff = now - Duration::seconds(Config::get().credential_purge_grace_seconds);
        let result = Entity::delete_many()
            .filter(Column::ExpiresAt.lt(cutoff))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn sign_pass(
    session_id: i64,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Result<String, AttendanceError> {
    let claims = PassClaims {
        sid: session_id,
        jti: Uuid::new_v4().to_string(),
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
    )
    .map_err(|e| AttendanceError::Db(DbErr::Custom(format!("Failed to sign pass: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;
    use chrono::NaiveDate;

    async fn todays_session(
        db: &DatabaseConnection,
    ) -> attendance_session::Model {
        let date = NaiveDate::from_ymd_opt(2026, 7, 22).unwrap();
        attendance_session::Model::get_or_create(db, date)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn issued_code_is_four_digits_and_ttl_is_clamped() {
        let db = setup_test_db().await;
        let session = todays_session(&db).await;
        let now = Utc::now();

        let cred = Model::issue(&db, &session, CredentialKind::Code, 120, now)
            .await
            .unwrap();
        assert_eq!(cred.secret.len(), 4);
        assert!(cred.secret.bytes().all(|b| b.is_ascii_digit()));
        assert_eq!(cred.expires_at, now + Duration::seconds(120));
        assert!(!cred.used);

        // A one-second request is pulled up to the configured minimum.
        let clamped = Model::issue(&db, &session, CredentialKind::Code, 1, now)
            .await
            .unwrap();
        let min = Config::get().credential_ttl_min_seconds;
        assert_eq!(clamped.expires_at, now + Duration::seconds(min));
    }

    #[tokio::test]
    async fn live_codes_do_not_collide() {
        let db = setup_test_db().await;
        let session = todays_session(&db).await;
        let now = Utc::now();

        let a = Model::issue(&db, &session, CredentialKind::Code, 300, now)
            .await
            .unwrap();
        let b = Model::issue(&db, &session, CredentialKind::Code, 300, now)
            .await
            .unwrap();
        assert_ne!(a.secret, b.secret);
        assert!(Model::code_in_use(&db, &a.secret, now).await.unwrap());
    }

    #[tokio::test]
    async fn pass_signature_binds_the_session() {
        let db = setup_test_db().await;
        let session = todays_session(&db).await;
        let now = Utc::now();

        let pass = Model::issue(&db, &session, CredentialKind::Qr, 120, now)
            .await
            .unwrap();
        assert_eq!(Model::kind_of_secret(&pass.secret), Some(CredentialKind::Qr));
        assert!(pass.verify_pass());

        // Re-pointing the stored row at another session must fail the check.
        let mut forged = pass.clone();
        forged.session_id += 1;
        assert!(!forged.verify_pass());
    }

    #[tokio::test]
    async fn issuing_into_a_closed_session_is_refused() {
        let db = setup_test_db().await;
        let session = todays_session(&db).await.close(&db).await.unwrap();

        let err = Model::issue(&db, &session, CredentialKind::Code, 120, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionClosed));
    }

    #[tokio::test]
    async fn secret_shapes_are_classified_without_the_store() {
        assert_eq!(Model::kind_of_secret("0042"), Some(CredentialKind::Code));
        assert_eq!(Model::kind_of_secret("004217"), Some(CredentialKind::Code));
        assert_eq!(Model::kind_of_secret("a.b.c"), Some(CredentialKind::Qr));
        assert_eq!(Model::kind_of_secret("12a4"), None);
        assert_eq!(Model::kind_of_secret("123"), None);
        assert_eq!(Model::kind_of_secret(""), None);
        assert_eq!(Model::kind_of_secret("a..c"), None);
    }

    #[tokio::test]
    async fn consume_is_single_shot() {
        let db = setup_test_db().await;
        let session = todays_session(&db).await;
        let cred = Model::issue(&db, &session, CredentialKind::Code, 120, Utc::now())
            .await
            .unwrap();

        assert!(Model::consume(&db, cred.id).await.unwrap());
        assert!(!Model::consume(&db, cred.id).await.unwrap());
    }

    #[tokio::test]
    async fn purge_removes_only_long_dead_credentials() {
        let db = setup_test_db().await;
        let session = todays_session(&db).await;
        let now = Utc::now();
        let grace = Config::get().credential_purge_grace_seconds;

        let live = Model::issue(&db, &session, CredentialKind::Code, 300, now)
            .await
            .unwrap();
        let dead = Model::issue(
            &db,
            &session,
            CredentialKind::Code,
            30,
            now - Duration::seconds(grace + 60),
        )
        .await
        .unwrap();

        let purged = Model::purge_expired(&db, now).await.unwrap();
        assert_eq!(purged, 1);
        assert!(Entity::find_by_id(live.id).one(&db).await.unwrap().is_some());
        assert!(Entity::find_by_id(dead.id).one(&db).await.unwrap().is_none());
    }
}
