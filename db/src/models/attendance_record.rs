use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{FromQueryResult, PaginatorTrait, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};

use crate::error::{AttendanceError, is_unique_violation};
use crate::models::attendance_credential::{self, CredentialKind};
use crate::models::{attendance_session, user};

/// Append-only ledger of redeemed attendance: one row per member per
/// session, the durable fact that someone was here on a given day.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub member_id: i64,
    pub session_id: i64,
    pub method: Method,
    pub taken_at: DateTime<Utc>,
}

/// How the attendance was established.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Display, EnumString, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_method_type")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Method {
    #[sea_orm(string_value = "code")]
    Code,
    #[sea_orm(string_value = "qr")]
    Qr,
    /// Admin bypass, no credential involved.
    #[sea_orm(string_value = "manual")]
    Manual,
}

impl From<CredentialKind> for Method {
    fn from(kind: CredentialKind) -> Self {
        match kind {
            CredentialKind::Code => Method::Code,
            CredentialKind::Qr => Method::Qr,
        }
    }
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
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::MemberId",
        to = "super::user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Member,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Member.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Redeems a presented secret for `member_id`.
    ///
    /// The conditional `used` flip is the serialization point: of any number
    /// of concurrent redemptions for one credential, exactly one reaches the
    /// ledger insert, and that insert is itself backstopped by the unique
    /// (session, member) index against double-submission of two different
    /// live credentials.
    pub async fn redeem(
        db: &DatabaseConnection,
        member_id: i64,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, AttendanceError> {
        let secret = secret.trim();
        let Some(kind) = attendance_credential::Model::kind_of_secret(secret) else {
            return Err(AttendanceError::MalformedCredential);
        };

        let credential = attendance_credential::Model::find_unused_by_secret(db, secret)
            .await?
            .ok_or(AttendanceError::InvalidCredential)?;

        let session = attendance_session::Model::find_by_id(db, credential.session_id)
            .await?
            .ok_or(AttendanceError::InvalidCredential)?;
        if !session.active {
            return Err(AttendanceError::SessionClosed);
        }

        if credential.is_expired(now) {
            // Left unused on purpose: the credential is simply dead.
            return Err(AttendanceError::ExpiredCredential);
        }

        if kind == CredentialKind::Qr && !credential.verify_pass() {
            return Err(AttendanceError::InvalidCredential);
        }

        if Self::has_attended(db, member_id, credential.session_id).await? {
            return Err(AttendanceError::AlreadyAttended);
        }

        if !attendance_credential::Model::consume(db, credential.id).await? {
            return Err(AttendanceError::InvalidCredential);
        }

        Self::insert_row(db, member_id, credential.session_id, kind.into(), now).await
    }

    /// Admin bypass: records attendance without a credential. Subject to the
    /// same at-most-once backstop as redemption.
    pub async fn manual_mark(
        db: &DatabaseConnection,
        member_id: i64,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, AttendanceError> {
        let member = user::Model::find_by_id(db, member_id)
            .await?
            .ok_or(AttendanceError::MemberNotFound)?;
        if !member.active {
            return Err(AttendanceError::MemberNotFound);
        }
        attendance_session::Model::find_by_id(db, session_id)
            .await?
            .ok_or(AttendanceError::SessionNotFound)?;

        Self::insert_row(db, member_id, session_id, Method::Manual, now).await
    }

    async fn insert_row(
        db: &DatabaseConnection,
        member_id: i64,
        session_id: i64,
        method: Method,
        now: DateTime<Utc>,
    ) -> Result<Self, AttendanceError> {
        let record = ActiveModel {
            id: NotSet,
            member_id: Set(member_id),
            session_id: Set(session_id),
            method: Set(method),
            taken_at: Set(now),
        };
        match record.insert(db).await {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => Err(AttendanceError::AlreadyAttended),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn has_attended(
        db: &DatabaseConnection,
        member_id: i64,
        session_id: i64,
    ) -> Result<bool, DbErr> {
        let hits = Entity::find()
            .filter(Column::MemberId.eq(member_id))
            .filter(Column::SessionId.eq(session_id))
            .count(db)
            .await?;
        Ok(hits > 0)
    }

    /// Session id of today's session if `member_id` has already redeemed for
    /// it; `None` when there is no session yet or no record.
    pub async fn attended_session_on(
        db: &DatabaseConnection,
        member_id: i64,
        date: NaiveDate,
    ) -> Result<Option<i64>, DbErr> {
        let Some(session) = attendance_session::Model::find_by_date(db, date).await? else {
            return Ok(None);
        };
        Ok(Self::has_attended(db, member_id, session.id)
            .await?
            .then_some(session.id))
    }

    pub async fn for_member(
        db: &DatabaseConnection,
        member_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::MemberId.eq(member_id))
            .order_by_desc(Column::TakenAt)
            .all(db)
            .await
    }

    pub async fn for_session(
        db: &DatabaseConnection,
        session_id: i64,
    ) -> Result<Vec<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::TakenAt)
            .all(db)
            .await
    }

    /// Attendance counts for a batch of sessions, for the admin listing.
    pub async fn counts_for_sessions(
        db: &DatabaseConnection,
        session_ids: &[i64],
    ) -> Result<HashMap<i64, i64>, DbErr> {
        if session_ids.is_empty() {
            return Ok(HashMap::new());
        }

        #[derive(FromQueryResult)]
        struct Row {
            session_id: i64,
            cnt: i64,
        }

        let rows: Vec<Row> = Entity::find()
            .select_only()
            .column(Column::SessionId)
            .column_as(Expr::expr(Func::count(Expr::col(Column::MemberId))), "cnt")
            .filter(Column::SessionId.is_in(session_ids.iter().copied()))
            .group_by(Column::SessionId)
            .into_model::<Row>()
            .all(db)
            .await?;

        Ok(rows.into_iter().map(|r| (r.session_id, r.cnt)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::test_utils::setup_test_db;
    use chrono::Duration;

    struct Ctx {
        member: user::Model,
        session: attendance_session::Model,
    }

    async fn setup(db: &DatabaseConnection) -> Ctx {
        let member = user::Model::create(db, "m0001", "m0001@test.com", Role::Member, true)
            .await
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 7, 23).unwrap();
        let session = attendance_session::Model::get_or_create(db, date)
            .await
            .unwrap();
        Ctx { member, session }
    }

    async fn issue_code(
        db: &DatabaseConnection,
        session: &attendance_session::Model,
        ttl: i64,
        now: DateTime<Utc>,
    ) -> attendance_credential::Model {
        attendance_credential::Model::issue(db, session, CredentialKind::Code, ttl, now)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn redeem_round_trip() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let t0 = Utc::now();

        let cred = issue_code(&db, &ctx.session, 60, t0).await;

        // Member redeems halfway through the window.
        let record = Model::redeem(&db, ctx.member.id, &cred.secret, t0 + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(record.member_id, ctx.member.id);
        assert_eq!(record.session_id, ctx.session.id);
        assert_eq!(record.method, Method::Code);

        let mine = Model::for_member(&db, ctx.member.id).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].id, record.id);

        // The same code is spent now.
        let again = Model::redeem(&db, ctx.member.id, &cred.secret, t0 + Duration::seconds(31))
            .await
            .unwrap_err();
        assert!(matches!(again, AttendanceError::InvalidCredential));
    }

    #[tokio::test]
    async fn expired_credential_never_succeeds_and_stays_unused() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let t0 = Utc::now();

        let cred = issue_code(&db, &ctx.session, 30, t0).await;

        let err = Model::redeem(&db, ctx.member.id, &cred.secret, t0 + Duration::seconds(31))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::ExpiredCredential));

        let row = attendance_credential::Entity::find_by_id(cred.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert!(!row.used);
        assert!(Model::for_member(&db, ctx.member.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_secret_is_rejected_up_front() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;

        for bad in ["12a4", "123", "", "abc", "not a code"] {
            let err = Model::redeem(&db, ctx.member.id, bad, Utc::now())
                .await
                .unwrap_err();
            assert!(
                matches!(err, AttendanceError::MalformedCredential),
                "{bad:?} should be malformed"
            );
        }
    }

    #[tokio::test]
    async fn second_credential_same_day_is_already_attended() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let t0 = Utc::now();

        let first = issue_code(&db, &ctx.session, 300, t0).await;
        let second = issue_code(&db, &ctx.session, 300, t0).await;

        Model::redeem(&db, ctx.member.id, &first.secret, t0)
            .await
            .unwrap();
        let err = Model::redeem(&db, ctx.member.id, &second.secret, t0)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyAttended));

        let mine = Model::for_member(&db, ctx.member.id).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn redeeming_a_qr_pass_records_the_method() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let t0 = Utc::now();

        let pass =
            attendance_credential::Model::issue(&db, &ctx.session, CredentialKind::Qr, 120, t0)
                .await
                .unwrap();
        let record = Model::redeem(&db, ctx.member.id, &pass.secret, t0)
            .await
            .unwrap();
        assert_eq!(record.method, Method::Qr);
    }

    #[tokio::test]
    async fn closed_session_blocks_redemption() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let t0 = Utc::now();

        let cred = issue_code(&db, &ctx.session, 300, t0).await;
        ctx.session.close(&db).await.unwrap();

        let err = Model::redeem(&db, ctx.member.id, &cred.secret, t0)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionClosed));
    }

    #[tokio::test]
    async fn manual_mark_bypasses_credentials_but_not_uniqueness() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let now = Utc::now();

        let record = Model::manual_mark(&db, ctx.member.id, ctx.session.id, now)
            .await
            .unwrap();
        assert_eq!(record.method, Method::Manual);

        let err = Model::manual_mark(&db, ctx.member.id, ctx.session.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::AlreadyAttended));

        let err = Model::manual_mark(&db, 9999, ctx.session.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::MemberNotFound));

        let err = Model::manual_mark(&db, ctx.member.id, 9999, now)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::SessionNotFound));
    }

    #[tokio::test]
    async fn concurrent_redemptions_succeed_exactly_once() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let t0 = Utc::now();

        let cred = issue_code(&db, &ctx.session, 300, t0).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                let secret = cred.secret.clone();
                let member_id = ctx.member.id;
                tokio::spawn(async move { Model::redeem(&db, member_id, &secret, t0).await })
            })
            .collect();

        let outcomes = futures::future::join_all(tasks).await;
        let mut successes = 0;
        for outcome in outcomes {
            match outcome.unwrap() {
                Ok(_) => successes += 1,
                Err(AttendanceError::InvalidCredential)
                | Err(AttendanceError::AlreadyAttended) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(successes, 1);

        let mine = Model::for_member(&db, ctx.member.id).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn attended_session_on_reflects_the_ledger() {
        let db = setup_test_db().await;
        let ctx = setup(&db).await;
        let date = ctx.session.session_date;

        assert_eq!(
            Model::attended_session_on(&db, ctx.member.id, date)
                .await
                .unwrap(),
            None
        );

        Model::manual_mark(&db, ctx.member.id, ctx.session.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            Model::attended_session_on(&db, ctx.member.id, date)
                .await
                .unwrap(),
            Some(ctx.session.id)
        );
    }
}
