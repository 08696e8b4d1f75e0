use crate::seed::Seeder;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use db::models::user::{Column as UserCol, Entity as UserEntity, Role};
use db::models::{attendance_record, attendance_session};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QuerySelect};

/// Seeds yesterday's session with a handful of check-ins so the admin
/// dashboard has something to show on a fresh database.
pub struct AttendanceSeeder;

#[async_trait]
impl Seeder for AttendanceSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        let yesterday = (Utc::now() - Duration::days(1)).date_naive();
        let session = attendance_session::Model::get_or_create(db, yesterday).await?;

        let members = UserEntity::find()
            .filter(UserCol::Role.eq(Role::Member))
            .limit(5)
            .all(db)
            .await?;

        let taken_at = Utc::now() - Duration::days(1);
        for member in members {
            // Re-runs hit the at-most-once rule; that's fine for seed data.
            let _ =
                attendance_record::Model::manual_mark(db, member.id, session.id, taken_at).await;
        }

        Ok(())
    }
}
