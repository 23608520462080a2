use std::str::FromStr;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::IdentityData;
use crate::credential::models::Role;
use crate::credential::models::UserId;
use crate::credential::ports::CredentialServicePort;
use crate::inbound::http::router::AppState;

pub async fn update_user_role(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserRoleBody>,
) -> Result<ApiSuccess<IdentityData>, ApiError> {
    let user_id =
        UserId::from_string(&user_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let role = Role::from_str(&body.role).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .credential_service
        .update_role(&user_id, role)
        .await
        .map_err(ApiError::from)
        .map(|ref identity| ApiSuccess::new(StatusCode::OK, identity.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateUserRoleBody {
    role: String,
}
