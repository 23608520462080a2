use std::sync::Arc;

use auth::TokenCodec;
use chrono::Duration;
use identity_service::config::Config;
use identity_service::domain::credential::service::CredentialService;
use identity_service::inbound::http::router::create_router;
use identity_service::outbound::email::LogEmailSender;
use identity_service::outbound::repositories::PostgresCredentialRepository;
use identity_service::outbound::repositories::PostgresTokenRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        frontend_base_url = %config.frontend.base_url,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = 5,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let token_codec = TokenCodec::new(
        config.tokens.access_secret.as_bytes(),
        config.tokens.refresh_secret.as_bytes(),
        Duration::minutes(config.tokens.access_ttl_minutes),
        Duration::days(config.tokens.refresh_ttl_days),
    );

    let credential_repository = Arc::new(PostgresCredentialRepository::new(pg_pool.clone()));
    let token_repository = Arc::new(PostgresTokenRepository::new(pg_pool));
    let email_sender = Arc::new(LogEmailSender::new(&config.email.from));

    let credential_service = Arc::new(CredentialService::new(
        credential_repository,
        token_repository,
        email_sender,
        token_codec.clone(),
        Duration::minutes(config.tokens.password_reset_ttl_minutes),
        &config.frontend.base_url,
    ));

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(credential_service, Arc::new(token_codec));
    axum::serve(http_listener, http_application).await?;

    Ok(())
}
