use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

use crate::auth::guards::{require_admin, require_member};
use crate::state::AppState;

mod common;
mod get;
mod post;
mod put;

pub use get::{get_session, list_session_records, list_sessions, my_attendance, my_attendance_today};
pub use post::{issue_credential, manual_mark, redeem};
pub use put::close_session;

pub fn attendance_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/credentials",
            post(issue_credential)
                .route_layer(from_fn_with_state(app_state.clone(), require_admin)),
        )
        .route(
            "/redeem",
            post(redeem).route_layer(from_fn_with_state(app_state.clone(), require_member)),
        )
        .route(
            "/me",
            get(my_attendance).route_layer(from_fn_with_state(app_state.clone(), require_member)),
        )
        .route(
            "/me/today",
            get(my_attendance_today)
                .route_layer(from_fn_with_state(app_state.clone(), require_member)),
        )
        .route(
            "/sessions",
            get(list_sessions).route_layer(from_fn_with_state(app_state.clone(), require_admin)),
        )
        .route(
            "/sessions/{session_id}",
            get(get_session).route_layer(from_fn_with_state(app_state.clone(), require_admin)),
        )
        .route(
            "/sessions/{session_id}/records",
            get(list_session_records)
                .post(manual_mark)
                .route_layer(from_fn_with_state(app_state.clone(), require_admin)),
        )
        .route(
            "/sessions/{session_id}/close",
            put(close_session).route_layer(from_fn_with_state(app_state.clone(), require_admin)),
        )
        .with_state(app_state)
}
