use std::sync::Arc;
use std::time::Duration;

use auth::TokenCodec;
use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::patch;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::confirm_password_reset::confirm_password_reset;
use super::handlers::health::health;
use super::handlers::list_users::list_users;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::me::me;
use super::handlers::refresh::refresh;
use super::handlers::register::register;
use super::handlers::request_password_reset::request_password_reset;
use super::handlers::update_user_role::update_user_role;
use super::middleware::authenticate as auth_middleware;
use super::middleware::require_role;
use super::middleware::RoleGate;
use crate::domain::credential::service::CredentialService;
use crate::outbound::email::LogEmailSender;
use crate::outbound::repositories::PostgresCredentialRepository;
use crate::outbound::repositories::PostgresTokenRepository;

#[derive(Clone)]
pub struct AppState {
    pub credential_service: Arc<
        CredentialService<PostgresCredentialRepository, PostgresTokenRepository, LogEmailSender>,
    >,
    pub token_codec: Arc<TokenCodec>,
}

pub fn create_router(
    credential_service: Arc<
        CredentialService<PostgresCredentialRepository, PostgresTokenRepository, LogEmailSender>,
    >,
    token_codec: Arc<TokenCodec>,
) -> Router {
    let state = AppState {
        credential_service,
        token_codec,
    };

    // Logout and refresh authenticate through the refresh token in the
    // body, not the Authorization header, so they stay public.
    let public_routes = Router::new()
        .route("/healthz", get(health))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/password-reset/request", post(request_password_reset))
        .route("/api/auth/password-reset/confirm", post(confirm_password_reset));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:user_id/role", patch(update_user_role))
        .route_layer(middleware::from_fn_with_state(
            RoleGate::allow(&["admin"]),
            require_role,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                uri = %request.uri(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
