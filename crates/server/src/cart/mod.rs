//! Cart reconciliation.
//!
//! The [`CartEngine`] decides between merging into an existing cart line and
//! inserting a new one, validates and coerces client input, and applies
//! quantity updates and removals under the configured [`MatchScope`].
//! Persistence is delegated to the [`CartStore`] and [`ProductCatalog`]
//! collaborators.

pub mod engine;
pub mod error;
pub mod locks;
pub mod request;
pub mod store;

use std::str::FromStr;

use cartline_core::{ProductIdentity, UserIdentity};

pub use engine::CartEngine;
pub use error::CartError;
pub use locks::PairLocks;
pub use request::{AddToCart, AddToCartRequest, UpdateQuantityRequest};
pub use store::{CartStore, LineFilter, ProductCatalog, Reconciled};

/// How quantity updates and removals locate their target line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchScope {
    /// Match by (user, product). Requests must name the user.
    #[default]
    Scoped,
    /// Match by product alone; the oldest line for the product wins.
    Global,
}

impl MatchScope {
    /// Build the filter for a request under this scope.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidRequest` when the scope is `Scoped` and no
    /// user was given.
    pub fn filter(
        self,
        user: Option<UserIdentity>,
        product: ProductIdentity,
    ) -> Result<LineFilter, CartError> {
        match self {
            Self::Scoped => {
                let user = user.ok_or_else(|| CartError::missing("userIdentity"))?;
                Ok(LineFilter::pair(user, product))
            }
            Self::Global => Ok(LineFilter::Product(product)),
        }
    }

    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scoped => "scoped",
            Self::Global => "global",
        }
    }
}

impl FromStr for MatchScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scoped" | "user" => Ok(Self::Scoped),
            "global" | "product" => Ok(Self::Global),
            other => Err(format!("expected `scoped` or `global`, got `{other}`")),
        }
    }
}

/// Whether and how the catalog is consulted when a new line is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotPolicy {
    /// Never consult the catalog; lines carry no snapshot.
    Skip,
    /// Capture a snapshot when the product is known, insert without one otherwise.
    BestEffort,
    /// Reject the add-to-cart with `NotFound` when the product is unknown.
    #[default]
    Require,
}

impl SnapshotPolicy {
    /// Configuration spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::BestEffort => "best_effort",
            Self::Require => "require",
        }
    }
}

impl FromStr for SnapshotPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "skip" | "off" => Ok(Self::Skip),
            "best_effort" => Ok(Self::BestEffort),
            "require" | "required" => Ok(Self::Require),
            other => Err(format!(
                "expected `skip`, `best_effort` or `require`, got `{other}`"
            )),
        }
    }
}
