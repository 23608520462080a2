use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;

use crate::domain::credential::models::Role;
use crate::domain::credential::models::UserId;
use crate::inbound::http::router::AppState;

/// Extension type carrying the verified caller identity through the request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub role: Role,
}

/// Middleware that verifies access tokens and adds caller info to request
/// extensions. Refresh tokens are rejected here: they are signed with a
/// different secret, so verification fails before any claim is inspected.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let claims = state.token_codec.verify_access(token).map_err(|e| {
        tracing::warn!("Access token verification failed: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid or expired token"
            })),
        )
            .into_response()
    })?;

    let user_id = UserId::from_string(&claims.sub).map_err(|e| {
        tracing::error!("Failed to parse user ID from token: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid token format"
            })),
        )
            .into_response()
    })?;

    let role = Role::from_str(&claims.role).map_err(|e| {
        tracing::error!("Failed to parse role from token: {}", e);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid token format"
            })),
        )
            .into_response()
    })?;

    req.extensions_mut()
        .insert(AuthenticatedUser { user_id, role });

    Ok(next.run(req).await)
}

/// Allow-list of roles permitted on a route group.
///
/// Role names are lowercased on construction and [`Role::as_str`] is
/// already lowercase, so membership checks are case-insensitive.
#[derive(Clone)]
pub struct RoleGate {
    allowed: Arc<HashSet<String>>,
}

impl RoleGate {
    pub fn allow(roles: &[&str]) -> Self {
        Self {
            allowed: Arc::new(roles.iter().map(|role| role.to_lowercase()).collect()),
        }
    }

    fn permits(&self, role: Role) -> bool {
        self.allowed.contains(role.as_str())
    }
}

/// Middleware gating routes on the caller's role. Runs after `authenticate`,
/// so a missing extension means the route was wired without the access gate.
pub async fn require_role(
    State(gate): State<RoleGate>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let actor = req.extensions().get::<AuthenticatedUser>().ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Authentication required"
            })),
        )
            .into_response()
    })?;

    if !gate.permits(actor.role) {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Insufficient permissions"
            })),
        )
            .into_response());
    }

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Missing Authorization header"
                })),
            )
                .into_response()
        })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid Authorization header"
            })),
        )
            .into_response()
    })?;

    if !auth_str.starts_with("Bearer ") {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "Invalid Authorization header format. Expected: Bearer <token>"
            })),
        )
            .into_response());
    }

    Ok(auth_str.trim_start_matches("Bearer "))
}
