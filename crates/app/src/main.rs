use std::{sync::Arc, time::Duration};

use engine::{HttpRateSource, RateProvider, RateSource};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "invoicer={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;

    let source: Arc<dyn RateSource> = Arc::new(HttpRateSource::new(
        &settings.fx.base_url,
        Duration::from_secs(settings.fx.timeout_secs),
    )?);
    let conversion_rates = Arc::new(RateProvider::new(
        source.clone(),
        Duration::from_secs(settings.fx.conversion_ttl_secs),
    ));
    let lookup_rates = Arc::new(RateProvider::new(
        source,
        Duration::from_secs(settings.fx.lookup_ttl_secs),
    ));

    let engine = engine::Engine::builder()
        .database(db)
        .rates(conversion_rates)
        .build()
        .await?;

    let addr = format!("{}:{}", settings.server.bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    server::run_with_listener(engine, lookup_rates, listener).await?;

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    tracing::info!("database ready");
    Ok(database)
}
