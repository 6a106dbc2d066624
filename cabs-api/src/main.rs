use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use cabs_api::{app, state::{AppState, AuthConfig}};
use cabs_booking::BookingService;
use cabs_core::{BookingEventSink, TracingEventSink};
use cabs_store::{app_config::Config, seed, EventProducer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cabs_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting cabs API on port {}", config.server.port);

    let repo = cabs_store::connect(&config.store).context("Failed to open cab store")?;

    if let Some(path) = &config.store.seed_file {
        // Only seed an empty collection so restarts against redis don't duplicate
        if repo.list_cabs().await?.is_empty() {
            let cabs = seed::load_seed_file(path).await?;
            seed::seed_repository(repo.as_ref(), cabs).await?;
        }
    }

    let events: Arc<dyn BookingEventSink> = match &config.kafka {
        Some(kafka) => Arc::new(
            EventProducer::new(&kafka.brokers, &kafka.topic).context("Failed to create Kafka producer")?,
        ),
        None => {
            tracing::info!("No Kafka configured, booking events go to the log");
            Arc::new(TracingEventSink)
        }
    };

    let bookings = Arc::new(BookingService::new(
        repo.clone(),
        events,
        config.business_rules.booking_limit,
    ));

    let app_state = AppState {
        repo,
        bookings,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
