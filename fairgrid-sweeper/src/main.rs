use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::time;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fairgrid_engine::ExpirySweeper;
use fairgrid_store::{Config, DbClient, PgEntityStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairgrid_sweeper=info,fairgrid_engine=info,fairgrid_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().expect("Failed to load config");
    tracing::info!(
        grace_period_days = config.sweeper.grace_period_days,
        interval_seconds = config.sweeper.interval_seconds,
        "Starting Fairgrid sweeper"
    );

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let store = Arc::new(PgEntityStore::new(db.pool.clone()));
    let sweeper = ExpirySweeper::new(store, Duration::days(config.sweeper.grace_period_days));

    let mut ticker = time::interval(std::time::Duration::from_secs(
        config.sweeper.interval_seconds,
    ));
    loop {
        ticker.tick().await;
        match sweeper.sweep_expired(Utc::now()).await {
            Ok(removed) => {
                tracing::info!(removed, "sweep pass completed");
            }
            Err(err) => {
                tracing::error!(error = %err, "sweep pass failed");
            }
        }
    }
}
