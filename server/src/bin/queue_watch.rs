//! Terminal queue watcher.
//!
//! Runs a live reconciliation view against a queue server and its Redis
//! channel, printing partition counts whenever they change. Useful for
//! eyeballing that pushed events and bulk loads agree.

use officehours_queue::{HttpPartitionSource, HttpQueueSettings, QueueClient, QueueSettings};
use officehours_redis::RedisEventChannel;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queue_watch=info,officehours_queue=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server_url =
        std::env::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let viewer_is_staff = std::env::var("VIEWER_STAFF")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(false);

    info!(%server_url, %redis_url, viewer_is_staff, "Starting queue watcher");

    let source = Arc::new(HttpPartitionSource::new(server_url.clone()));
    let settings = Arc::new(HttpQueueSettings::new(server_url, viewer_is_staff));
    let channel = Arc::new(RedisEventChannel::connect(&redis_url).await?);

    let track_pending = settings.moderation_visible().await;
    let client = QueueClient::start(source, settings, channel, track_pending).await?;

    let mut last = (usize::MAX, usize::MAX, usize::MAX);
    loop {
        let snapshot = client.snapshot().await;
        let counts = (
            snapshot.pending.tickets.len(),
            snapshot.open.tickets.len(),
            snapshot.assigned.tickets.len(),
        );
        if counts != last {
            info!(
                pending = counts.0,
                open = counts.1,
                assigned = counts.2,
                "queue changed"
            );
            last = counts;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}
