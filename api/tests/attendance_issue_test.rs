mod helpers;

use api::auth::generate_jwt;
use axum::{body::Body, http::Request, http::StatusCode};
use chrono::{DateTime, Utc};
use sea_orm::EntityTrait;
use tower::ServiceExt;

use db::models::attendance_session::Entity as SessionEntity;

use crate::helpers::app::{body_json, make_test_app, seed_admin, seed_member};

fn issue_request(token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/attendance/credentials")
        .header("Authorization", format!("Bearer {token}"))
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn admin_issues_a_short_code_for_todays_session() {
    let (app, state) = make_test_app().await;
    let admin = seed_admin(state.db(), "issue").await;
    let (token, _) = generate_jwt(admin.id, admin.role);

    let resp = app
        .oneshot(issue_request(&token, serde_json::json!({ "kind": "code" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let json = body_json(resp).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "Attendance credential issued");

    let secret = json["data"]["secret"].as_str().unwrap();
    assert_eq!(secret.len(), 4);
    assert!(secret.bytes().all(|b| b.is_ascii_digit()));

    // The session was created lazily for today's UTC date.
    let session_id = json["data"]["session_id"].as_i64().unwrap();
    let session = SessionEntity::find_by_id(session_id)
        .one(state.db())
        .await
        .unwrap()
        .expect("session created");
    assert_eq!(session.session_date, Utc::now().date_naive());
    assert!(session.active);
}

#[tokio::test]
async fn repeated_issuance_reuses_the_daily_session() {
    let (app, state) = make_test_app().await;
    let admin = seed_admin(state.db(), "reuse").await;
    let (token, _) = generate_jwt(admin.id, admin.role);

    let first = body_json(
        app.clone()
            .oneshot(issue_request(&token, serde_json::json!({ "kind": "code" })))
            .await
            .unwrap(),
    )
    .await;
    let second = body_json(
        app.oneshot(issue_request(&token, serde_json::json!({ "kind": "qr" })))
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(first["data"]["session_id"], second["data"]["session_id"]);
    assert_ne!(first["data"]["secret"], second["data"]["secret"]);
}

#[tokio::test]
async fn requested_ttl_is_clamped_to_policy() {
    let (app, state) = make_test_app().await;
    let admin = seed_admin(state.db(), "ttl").await;
    let (token, _) = generate_jwt(admin.id, admin.role);

    let json = body_json(
        app.oneshot(issue_request(
            &token,
            serde_json::json!({ "kind": "code", "ttl_seconds": 5 }),
        ))
        .await
        .unwrap(),
    )
    .await;

    let issued_at: DateTime<Utc> = json["data"]["issued_at"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    let expires_at: DateTime<Utc> = json["data"]["expires_at"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();
    // Default policy floor is 30 seconds.
    assert_eq!((expires_at - issued_at).num_seconds(), 30);
}

#[tokio::test]
async fn qr_pass_looks_like_a_signed_token() {
    let (app, state) = make_test_app().await;
    let admin = seed_admin(state.db(), "qr").await;
    let (token, _) = generate_jwt(admin.id, admin.role);

    let json = body_json(
        app.oneshot(issue_request(&token, serde_json::json!({ "kind": "qr" })))
            .await
            .unwrap(),
    )
    .await;

    let secret = json["data"]["secret"].as_str().unwrap();
    assert_eq!(secret.split('.').count(), 3);
    assert_eq!(json["data"]["kind"], "qr");
}

#[tokio::test]
async fn member_issuance_is_forbidden_with_no_side_effects() {
    let (app, state) = make_test_app().await;
    let member = seed_member(state.db(), "forbidden").await;
    let (token, _) = generate_jwt(member.id, member.role);

    let resp = app
        .oneshot(issue_request(&token, serde_json::json!({ "kind": "code" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The rejected call must not have created a session as a side effect.
    let sessions = SessionEntity::find().all(state.db()).await.unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn issuance_requires_a_valid_token() {
    let (app, _state) = make_test_app().await;

    let no_token = Request::builder()
        .method("POST")
        .uri("/api/attendance/credentials")
        .header("Content-Type", "application/json")
        .body(Body::from(r#"{"kind":"code"}"#))
        .unwrap();
    let resp = app.clone().oneshot(no_token).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(issue_request("not-a-jwt", serde_json::json!({ "kind": "code" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
