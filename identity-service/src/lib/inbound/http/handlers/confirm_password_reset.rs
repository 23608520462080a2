use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageResponseData;
use crate::credential::ports::CredentialServicePort;
use crate::inbound::http::router::AppState;

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<ConfirmPasswordResetBody>,
) -> Result<ApiSuccess<MessageResponseData>, ApiError> {
    state
        .credential_service
        .confirm_password_reset(&body.token, &body.new_password)
        .await
        .map_err(ApiError::from)
        .map(|()| {
            ApiSuccess::new(
                StatusCode::OK,
                MessageResponseData {
                    message: "Password updated".to_string(),
                },
            )
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfirmPasswordResetBody {
    token: String,
    new_password: String,
}
