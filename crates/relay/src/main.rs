//! Relay entry point.

use relay::{Config, LogFormat, Relay, RelayError};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus recorder with its scrape listener
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()?;
    tracing::info!(addr = %config.metrics_addr, "metrics listener started");

    // 3. Wire stores, worker, gateway and saga
    let relay = Relay::new(&config);

    // 4. Optionally push one booking through checkout
    if config.demo_checkout {
        let booking = relay.seed_demo_booking().await?;
        let payment = relay
            .consumer()
            .saga()
            .start_checkout(booking.id, &booking.user_id)
            .await?;
        tracing::info!(payment_id = %payment.id, "demo checkout started");
    }

    // 5. Run until SIGINT/SIGTERM
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        relay::shutdown_signal().await;
        signal_cancel.cancel();
    });

    tracing::info!(
        exchange = %config.outbox.exchange,
        dead_letter_exchange = %config.outbox.dead_letter_exchange,
        "relay running"
    );
    relay.run(cancel).await?;

    tracing::info!("relay shut down gracefully");
    Ok(())
}
