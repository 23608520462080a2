use axum::http::StatusCode;

use super::ApiSuccess;
use super::MessageResponseData;

/// Liveness check; touches no state.
pub async fn health() -> ApiSuccess<MessageResponseData> {
    ApiSuccess::new(
        StatusCode::OK,
        MessageResponseData {
            message: "ok".to_string(),
        },
    )
}
