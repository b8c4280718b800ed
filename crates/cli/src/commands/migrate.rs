//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! cartline migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CARTLINE_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Migrations live in `crates/server/migrations/` and are embedded into the
//! server crate at build time:
//! ```text
//! migrations/
//! ├── 20260301000001_create_product.sql
//! └── 20260301000002_create_cart_line.sql
//! ```

use cartline_server::config::CartlineConfig;
use cartline_server::db;

/// Errors raised while migrating.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] cartline_server::config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if no database URL is configured, the connection fails,
/// or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let config = CartlineConfig::from_env()?;
    let database_url = config.require_database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(database_url).await?;

    tracing::info!("Running migrations...");
    db::MIGRATOR.run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
