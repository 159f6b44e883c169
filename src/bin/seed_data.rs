//! Seeds the demo menu.
//!
//! Run with: cargo run --bin seed-data -- --migrate
//!
//! Existing meals are removed first, so repeated runs leave exactly one copy
//! of the menu. Order lines keep their own name and price snapshot and are not
//! affected.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use storefront_api::{db, seed};

#[derive(Parser, Debug)]
#[command(name = "seed-data", about = "Replace the menu with the demo meals")]
struct Cli {
    /// Database URL; falls back to DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    /// Apply pending migrations before seeding
    #[arg(long)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://storefront.db?mode=rwc".to_string());

    info!("Connecting to database: {}", database_url);
    let conn = db::establish_connection(&database_url)
        .await
        .context("failed to connect to database")?;

    if cli.migrate {
        db::run_migrations(&conn).await?;
    }

    let meals = seed::seed_meals(&conn)
        .await
        .context("seeding meals failed")?;
    for meal in &meals {
        info!(id = %meal.id, name = %meal.name, price_minor = meal.price_minor, "meal");
    }
    info!("Seeded {} meals", meals.len());

    Ok(())
}
