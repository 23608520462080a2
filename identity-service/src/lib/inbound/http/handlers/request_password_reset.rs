use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::MessageResponseData;
use crate::credential::models::EmailAddress;
use crate::credential::ports::CredentialServicePort;
use crate::inbound::http::router::AppState;

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<RequestPasswordResetBody>,
) -> Result<ApiSuccess<MessageResponseData>, ApiError> {
    let email =
        EmailAddress::new(&body.email).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .credential_service
        .request_password_reset(&email)
        .await
        .map_err(ApiError::from)
        .map(|()| {
            // Fixed body regardless of whether the email is registered.
            ApiSuccess::new(
                StatusCode::ACCEPTED,
                MessageResponseData {
                    message: "If the email is registered, a reset link has been sent".to_string(),
                },
            )
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestPasswordResetBody {
    email: String,
}
