use api::routes::routes;
use api::state::AppState;
use axum::Router;
use db::models::user::{Model as UserModel, Role};
use sea_orm::DatabaseConnection;
use serde_json::Value;

/// Router over a fresh in-memory database, plus the state for direct
/// store access from assertions.
pub async fn make_test_app() -> (Router, AppState) {
    let db = db::test_utils::setup_test_db().await;
    let state = AppState::new(db);
    let app = Router::new().nest("/api", routes(state.clone()));
    (app, state)
}

pub async fn seed_admin(db: &DatabaseConnection, tag: &str) -> UserModel {
    UserModel::create(
        db,
        &format!("admin_{tag}"),
        &format!("admin_{tag}@test.com"),
        Role::Admin,
        true,
    )
    .await
    .expect("seed admin")
}

pub async fn seed_member(db: &DatabaseConnection, tag: &str) -> UserModel {
    UserModel::create(
        db,
        &format!("member_{tag}"),
        &format!("member_{tag}@test.com"),
        Role::Member,
        true,
    )
    .await
    .expect("seed member")
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
