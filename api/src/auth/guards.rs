use crate::auth::claims::AuthUser;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{
    Json,
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use db::models::user::{self, Role};

#[derive(serde::Serialize, Default)]
pub struct Empty;

/// Extracts and validates the caller from the request, then re-inserts the
/// `AuthUser` into the request extensions for handlers downstream.
async fn extract_and_insert_authuser(
    mut req: Request<Body>,
) -> Result<(Request<Body>, AuthUser), (StatusCode, Json<ApiResponse<Empty>>)> {
    let (mut parts, body) = req.into_parts();
    let user = AuthUser::from_request_parts(&mut parts, &())
        .await
        .map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Authentication required")),
            )
        })?;

    req = Request::from_parts(parts, body);
    req.extensions_mut().insert(user.clone());
    Ok((req, user))
}

/// Role guard shared by the public guards below.
///
/// Roles match exactly: there is no hierarchy, and an admin token does not
/// pass a member-only gate. Unknown and inactive users get the same 401 as
/// an invalid token, so callers cannot probe which accounts exist.
async fn require_role(
    app_state: AppState,
    req: Request<Body>,
    next: Next,
    required: Role,
    failure_msg: &str,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    let (req, user) = extract_and_insert_authuser(req).await?;

    let row = user::Model::find_by_id(app_state.db(), user.0.sub)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = user.0.sub, "User lookup failed in guard");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("Internal server error")),
            )
        })?;

    let active = match row {
        Some(u) if u.active => u,
        _ => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Authentication required")),
            ));
        }
    };

    // The store, not the token, is the source of truth for the role.
    if active.role != required {
        return Err((
            StatusCode::FORBIDDEN,
            Json(ApiResponse::error(failure_msg)),
        ));
    }

    Ok(next.run(req).await)
}

/// Admin-only guard.
pub async fn require_admin(
    State(app_state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    require_role(app_state, req, next, Role::Admin, "Admin access required").await
}

/// Member-only guard.
pub async fn require_member(
    State(app_state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<Empty>>)> {
    require_role(app_state, req, next, Role::Member, "Member access required").await
}
