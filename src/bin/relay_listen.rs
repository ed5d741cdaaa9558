//! Relay listener.
//!
//! Holds one payment event stream open against a gateway and logs every
//! payment notification it receives. Reconnects with capped exponential
//! backoff until SIGINT or SIGTERM.

use std::sync::Arc;

use marketplace_relay::adapters::relay::{ClientRelay, HttpEventStreamTransport};
use marketplace_relay::config::ClientConfig;
use marketplace_relay::domain::notification::PaymentEvent;
use marketplace_relay::telemetry::{self, LogFormat};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ClientConfig::load()?;
    config.validate()?;
    telemetry::init(&config.log_level, LogFormat::Compact);

    let transport = HttpEventStreamTransport::new(config.stream_url.clone(), config.token.clone())?;
    let relay = ClientRelay::new(Arc::new(transport), config.backoff());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = telemetry::wait_for_shutdown_signal().await {
            tracing::error!(error = %e, "failed to install signal handlers");
        }
        signal.cancel();
    });

    tracing::info!(url = %config.stream_url, "relay listener starting");
    relay.run(shutdown, display).await;
    Ok(())
}

fn display(event: PaymentEvent) {
    match event {
        PaymentEvent::PaymentSuccess {
            product_id,
            product_title,
        } => tracing::info!(
            %product_id,
            product_title = product_title.as_deref().unwrap_or(""),
            "payment succeeded"
        ),
        PaymentEvent::PaymentFailed {
            product_id,
            product_title,
            message,
        } => tracing::warn!(
            product_id = product_id.as_deref().unwrap_or(""),
            product_title = product_title.as_deref().unwrap_or(""),
            %message,
            "payment failed"
        ),
        PaymentEvent::Connected => {}
    }
}
