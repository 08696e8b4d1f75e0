use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::entity::prelude::*;

use crate::error::is_unique_violation;

/// One attendance-taking session per UTC calendar day.
///
/// Sessions are created lazily by the first credential issuance of the day
/// and are never mutated afterwards except to flip `active` off.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, serde::Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Unique per invariant; dates are resolved in UTC everywhere.
    pub session_date: Date,
    pub description: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::attendance_credential::Entity")]
    Credentials,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::attendance_credential::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Credentials.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Returns the session for `date`, creating it if none exists yet.
    ///
    /// Concurrency-safe: the insert races against the unique index on
    /// `session_date`, and the loser re-reads the winner's row instead of
    /// fabricating a duplicate.
    pub async fn get_or_create(db: &DatabaseConnection, date: NaiveDate) -> Result<Self, DbErr> {
        if let Some(existing) = Self::find_by_date(db, date).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let session = ActiveModel {
            id: NotSet,
            session_date: Set(date),
            description: Set(format!("Training session {date}")),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match session.insert(db).await {
            Ok(row) => Ok(row),
            Err(err) if is_unique_violation(&err) => Self::find_by_date(db, date)
                .await?
                .ok_or(DbErr::RecordNotFound(format!(
                    "Attendance session for {date} missing after insert conflict"
                ))),
            Err(err) => Err(err),
        }
    }

    pub async fn find_by_date(
        db: &DatabaseConnection,
        date: NaiveDate,
    ) -> Result<Option<Self>, DbErr> {
        Entity::find()
            .filter(Column::SessionDate.eq(date))
            .one(db)
            .await
    }

    pub async fn find_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<Self>, DbErr> {
        Entity::find_by_id(id).one(db).await
    }

    /// Flips `active` off. Closed sessions accept no further issuance or
    /// redemption for their date.
    pub async fn close(self, db: &DatabaseConnection) -> Result<Self, DbErr> {
        let mut session: ActiveModel = self.into();
        session.active = Set(false);
        session.updated_at = Set(Utc::now());
        session.update(db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn get_or_create_is_idempotent_per_date() {
        let db = setup_test_db().await;
        let date = NaiveDate::from_ymd_opt(2026, 7, 20).unwrap();

        let first = Model::get_or_create(&db, date).await.unwrap();
        let second = Model::get_or_create(&db, date).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(first.active);

        let other = Model::get_or_create(&db, date.succ_opt().unwrap())
            .await
            .unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn close_flips_active_and_sticks() {
        let db = setup_test_db().await;
        let date = NaiveDate::from_ymd_opt(2026, 7, 21).unwrap();

        let session = Model::get_or_create(&db, date).await.unwrap();
        let closed = session.close(&db).await.unwrap();
        assert!(!closed.active);

        // The closed row is what a later lookup for the same date sees.
        let again = Model::get_or_create(&db, date).await.unwrap();
        assert_eq!(again.id, closed.id);
        assert!(!again.active);
    }
}
