//! Office-hours queue HTTP server.
//!
//! Wires the lifecycle engine to a `PostgreSQL` ticket store and a Redis
//! event channel, then serves the ticket API.

mod api;
mod config;
mod error;
mod routes;
mod state;

use config::Config;
use officehours_core::environment::SystemClock;
use officehours_engine::{LifecycleEngine, StaticSiteSettings};
use officehours_postgres::PostgresTicketStore;
use officehours_redis::RedisEventChannel;
use state::AppState;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting office-hours queue server");
    info!(
        postgres_url = %config.postgres.url,
        redis_url = %config.redis.url,
        moderation_enabled = config.queue.moderation_enabled,
        "Configuration loaded"
    );

    // Ticket store
    info!("Connecting to ticket store...");
    let store = PostgresTicketStore::connect(&config.postgres.url).await?;
    store.ensure_schema().await?;
    info!("Ticket store ready");

    // Event channel
    info!("Connecting to event channel...");
    let channel = RedisEventChannel::connect(&config.redis.url).await?;
    info!("Event channel connected");

    let settings = StaticSiteSettings {
        moderation_enabled: config.queue.moderation_enabled,
        public_tickets_enabled: config.queue.public_tickets_enabled,
        cooldown_minutes: config.queue.cooldown_minutes,
    };

    let engine = Arc::new(LifecycleEngine::new(
        Arc::new(store),
        Arc::new(channel),
        Arc::new(settings),
        Arc::new(SystemClock),
    ));

    let app = routes::build_router(AppState::new(engine, config.queue));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolve when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(error) => tracing::error!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
