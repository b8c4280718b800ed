//! Store collaborators for the cart engine.
//!
//! # Database: `PostgreSQL`, schema `cartline`
//!
//! ## Tables
//!
//! - `cart_line` - One row per (user, product) pair
//! - `product` - Catalog consulted for snapshots on first add-to-cart
//!
//! An in-memory implementation of both collaborators lives in [`memory`] for
//! tests and for running the service without a database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p cartline-cli -- migrate
//! ```

pub mod cart_lines;
pub mod memory;
pub mod products;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use cart_lines::PgCartStore;
pub use memory::{MemoryCartStore, MemoryCatalog};
pub use products::PgProductCatalog;

/// Embedded schema migrations for the `cartline` schema.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate product id).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Input rejected before reaching the store.
    #[error("invalid input: {0}")]
    Invalid(String),

    /// The store cannot serve requests right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store does not implement an optional primitive.
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, what: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
