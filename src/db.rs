use crate::config::AppConfig;
use crate::migrator::Migrator;
use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> anyhow::Result<DbPool> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };

    establish_connection_with_config(&config).await
}

/// Establishes a connection pool to the database with custom configuration
pub async fn establish_connection_with_config(config: &DbConfig) -> anyhow::Result<DbPool> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(opt)
        .await
        .context("failed to connect to database")?;

    info!(
        "Connected to database with max_connections={}",
        config.max_connections
    );

    Ok(pool)
}

/// Builds a pool from the application configuration, optionally running
/// migrations when `auto_migrate` is set.
pub async fn establish_connection_from_app_config(config: &AppConfig) -> anyhow::Result<DbPool> {
    let db_config = DbConfig {
        url: config.database_url.clone(),
        max_connections: config.db_max_connections,
        min_connections: config.db_min_connections,
        ..Default::default()
    };

    let pool = establish_connection_with_config(&db_config).await?;

    if config.auto_migrate {
        run_migrations(&pool)
            .await
            .context("failed to run database migrations")?;
    }

    Ok(pool)
}

/// Applies all pending migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbErr> {
    info!("Running database migrations");
    Migrator::up(pool, None).await?;
    info!("Database migrations complete");
    Ok(())
}

/// Verifies the pool can still reach the database.
pub async fn ping(pool: &DbPool) -> Result<(), DbErr> {
    pool.ping().await
}
