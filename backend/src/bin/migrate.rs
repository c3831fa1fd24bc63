//! Standalone migration runner for the warehouse stock ledger database.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warehouse_ledger::{db, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warehouse_ledger=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Environment: {}", config.environment);

    tracing::info!("Connecting to database...");
    let pool = db::connect(&config.database).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;
    tracing::info!("Migrations completed");

    Ok(())
}
