//! Application state shared across Axum route handlers.

use sea_orm::DatabaseConnection;

/// Central application state: a cloned, thread-safe database connection.
/// All mutable state lives in the store; nothing in-process survives a
/// restart, and nothing needs to.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
}

impl AppState {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Shared reference to the database connection.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Owned clone, for spawned tasks.
    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }
}
