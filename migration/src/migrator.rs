use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202607190001_create_users::Migration),
            Box::new(migrations::m202607190002_create_attendance_sessions::Migration),
            Box::new(migrations::m202607190003_create_attendance_credentials::Migration),
            Box::new(migrations::m202607190004_create_attendance_records::Migration),
        ]
    }
}
