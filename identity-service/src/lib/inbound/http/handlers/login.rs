use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use super::ApiError;
use super::ApiSuccess;
use super::SessionResponseData;
use crate::credential::models::EmailAddress;
use crate::credential::models::LoginCommand;
use crate::credential::ports::CredentialServicePort;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequestBody>,
) -> Result<ApiSuccess<SessionResponseData>, ApiError> {
    // An email that does not even parse gets the same answer as a wrong
    // password, so the response shape stays uniform.
    let email = EmailAddress::new(&body.email)
        .map_err(|_| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    state
        .credential_service
        .login(LoginCommand {
            email,
            password: body.password,
        })
        .await
        .map_err(ApiError::from)
        .map(|(identity, tokens)| {
            ApiSuccess::new(
                StatusCode::OK,
                SessionResponseData {
                    user: (&identity).into(),
                    tokens: tokens.into(),
                },
            )
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequestBody {
    email: String,
    password: String,
}
