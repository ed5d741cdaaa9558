//! Stream gateway server.
//!
//! Reads `MARKETPLACE_RELAY__*` configuration, connects the bus and serves
//! `GET /api/notifications/stream` until SIGINT or SIGTERM.

use std::sync::Arc;

use marketplace_relay::adapters::auth::JwtSessionValidator;
use marketplace_relay::adapters::broker::{InMemoryMessageBus, RedisBrokerFactory};
use marketplace_relay::adapters::http::{app_router, AuthState, StreamAppState};
use marketplace_relay::config::AppConfig;
use marketplace_relay::ports::BrokerClientFactory;
use marketplace_relay::telemetry::{self, LogFormat};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    let format = if config.is_production() {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    telemetry::init(&config.server.log_level, format);

    let brokers: Arc<dyn BrokerClientFactory> = if config.redis.is_in_memory() {
        tracing::warn!("using in-process bus; events published elsewhere will not arrive");
        Arc::new(InMemoryMessageBus::with_buffer(config.relay.message_buffer))
    } else {
        Arc::new(RedisBrokerFactory::new(
            &config.redis.url,
            config.redis.timeout(),
            config.relay.message_buffer,
        )?)
    };

    let validator = JwtSessionValidator::new(&config.auth.jwt_secret, config.auth.issuer.as_deref());
    let auth = AuthState::new(Arc::new(validator), config.auth.session_cookie.as_str());

    let shutdown = CancellationToken::new();
    let streams = StreamAppState::new(
        brokers,
        config.relay.heartbeat_interval(),
        shutdown.clone(),
    );
    let app = app_router(streams, auth, &config.server.cors_origins_list());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        heartbeat_secs = config.relay.heartbeat_interval_secs,
        "stream gateway listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = telemetry::wait_for_shutdown_signal().await {
                tracing::error!(error = %e, "failed to install signal handlers");
            }
            tracing::info!("shutdown requested; closing open streams");
            shutdown.cancel();
        })
        .await?;

    tracing::info!("stream gateway stopped");
    Ok(())
}
