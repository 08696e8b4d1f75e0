use crate::seed::Seeder;
use async_trait::async_trait;
use db::models::user::{Model, Role};
use fake::{Fake, faker::internet::en::SafeEmail};
use sea_orm::{DatabaseConnection, DbErr};

pub struct UserSeeder;

#[async_trait]
impl Seeder for UserSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), DbErr> {
        // Fixed front-desk admin
        Model::create(db, "g00000001", "frontdesk@example.com", Role::Admin, true).await?;

        // Fixed member for manual testing
        Model::create(db, "g00000002", "member@example.com", Role::Member, true).await?;

        // Random members; collisions with earlier runs are ignored
        for _ in 0..10 {
            let username = format!("g{:08}", fastrand::u32(..100_000_000));
            let email: String = SafeEmail().fake();
            let _ = Model::create(db, &username, &email, Role::Member, true).await;
        }

        Ok(())
    }
}
