//! Connection pool and schema bootstrap.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts, normally taken from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
}

impl PoolSettings {
    /// Settings for `url` with the same tuning as an unconfigured [`AppConfig`].
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::from(&AppConfig::default())
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.starts_with("sqlite::memory:") || self.url.contains("mode=memory")
    }

    fn connect_options(&self) -> ConnectOptions {
        // every in-memory SQLite connection is a separate database
        let (max, min) = if self.is_in_memory() {
            if self.max_connections > 1 {
                warn!("In-memory database requested, pinning pool to a single connection");
            }
            (1, 1)
        } else {
            (self.max_connections, self.min_connections.min(self.max_connections))
        };

        let mut options = ConnectOptions::new(self.url.clone());
        options
            .max_connections(max)
            .min_connections(min)
            .connect_timeout(self.connect_timeout)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
            .sqlx_logging(false);
        options
    }
}

impl From<&AppConfig> for PoolSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
        }
    }
}

/// Opens a pool with explicit settings.
pub async fn connect(settings: &PoolSettings) -> Result<DbPool, ServiceError> {
    let options = settings.connect_options();
    debug!(
        max_connections = options.get_max_connections(),
        "Opening database pool"
    );
    let pool = Database::connect(options).await.map_err(|e| {
        error!(error = %e, "Could not open database pool");
        ServiceError::DatabaseError(e)
    })?;
    info!("Database pool ready");
    Ok(pool)
}

pub async fn establish_connection(database_url: &str) -> Result<DbPool, ServiceError> {
    connect(&PoolSettings::for_url(database_url)).await
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    connect(&PoolSettings::from(cfg)).await
}

/// Applies every pending migration from [`crate::migrator::Migrator`].
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbErr> {
    let started = Instant::now();
    match crate::migrator::Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "Schema up to date");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Schema migration failed");
            Err(e)
        }
    }
}

pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    pool.ping().await.map_err(|e| {
        warn!(error = %e, "Database ping failed");
        e
    })
}
