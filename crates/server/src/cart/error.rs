//! Cart engine errors.

use cartline_core::{IdentityError, QuantityError};
use thiserror::Error;

use crate::db::RepositoryError;

/// Errors reported by the cart engine.
///
/// None of them are retried by the engine.
#[derive(Debug, Error)]
pub enum CartError {
    /// The caller supplied missing or malformed fields.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The referenced cart line or product does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying store call failed.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

impl CartError {
    /// A required field was absent.
    #[must_use]
    pub fn missing(field: &str) -> Self {
        Self::InvalidRequest(format!("{field} is required"))
    }
}

impl From<IdentityError> for CartError {
    fn from(err: IdentityError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<QuantityError> for CartError {
    fn from(err: QuantityError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}
