use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use super::IdentityData;
use crate::credential::models::Pagination;
use crate::credential::ports::CredentialServicePort;
use crate::inbound::http::router::AppState;

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<ApiSuccess<ListUsersResponseData>, ApiError> {
    state
        .credential_service
        .list_credentials(query.page.unwrap_or(1), query.limit.unwrap_or(20))
        .await
        .map_err(ApiError::from)
        .map(|(identities, pagination)| {
            ApiSuccess::new(
                StatusCode::OK,
                ListUsersResponseData {
                    users: identities.iter().map(IdentityData::from).collect(),
                    pagination,
                },
            )
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListUsersQuery {
    page: Option<i64>,
    limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListUsersResponseData {
    pub users: Vec<IdentityData>,
    pub pagination: Pagination,
}
