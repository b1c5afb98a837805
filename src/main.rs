use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use task_tracker::{api, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        "Starting task tracker (db: {}, rate limit: {} req / {}s, reconcile every {}s)",
        config.database_path.display(),
        config.rate_limit.max_requests,
        config.rate_limit.window.as_secs(),
        config.reconcile_interval.as_secs()
    );

    api::serve(config).await
}
