//! Collaborator interfaces consumed by the cart engine.
//!
//! The engine never talks to a database directly. It asks a [`CartStore`]
//! for cart lines and a [`ProductCatalog`] for products, each keyed by a
//! filter, and surfaces any failure as a store error without interpreting it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cartline_core::{ProductIdentity, Quantity, UserIdentity};

use crate::db::RepositoryError;
use crate::models::{CartLine, NewCartLine, NewProduct, Product};

/// Which cart line(s) an operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFilter {
    /// The line for one user and one product.
    Pair {
        user: UserIdentity,
        product: ProductIdentity,
    },
    /// Any line for the product, regardless of owner. Stores resolve this to
    /// the oldest matching line.
    Product(ProductIdentity),
}

impl LineFilter {
    /// Filter for one user's line of one product.
    #[must_use]
    pub const fn pair(user: UserIdentity, product: ProductIdentity) -> Self {
        Self::Pair { user, product }
    }

    /// Whether `line` satisfies this filter.
    #[must_use]
    pub fn matches(&self, line: &CartLine) -> bool {
        match self {
            Self::Pair { user, product } => {
                line.user_identity == *user && line.product_identity == *product
            }
            Self::Product(product) => line.product_identity == *product,
        }
    }

    /// The product every matching line refers to.
    #[must_use]
    pub const fn product(&self) -> &ProductIdentity {
        match self {
            Self::Pair { product, .. } | Self::Product(product) => product,
        }
    }
}

/// Outcome of an add-to-cart call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// No line existed for the pair; this one was inserted.
    Created(CartLine),
    /// The requested quantity was added to the existing line.
    Merged(CartLine),
}

impl Reconciled {
    /// Whether a new line was inserted.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    /// Borrow the resulting line.
    #[must_use]
    pub const fn line(&self) -> &CartLine {
        match self {
            Self::Created(line) | Self::Merged(line) => line,
        }
    }

    /// Take the resulting line.
    #[must_use]
    pub fn into_line(self) -> CartLine {
        match self {
            Self::Created(line) | Self::Merged(line) => line,
        }
    }
}

/// Persistence for cart lines.
///
/// Every method is a single store call. Methods that target one line by
/// [`LineFilter`] return `None` (or a zero count) when nothing matched.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Find the line matching `filter`.
    async fn find_line(&self, filter: &LineFilter) -> Result<Option<CartLine>, RepositoryError>;

    /// All lines owned by `user`, in store-native order.
    async fn find_lines(&self, user: &UserIdentity) -> Result<Vec<CartLine>, RepositoryError>;

    /// Insert a new line and return it with its assigned ID.
    async fn insert_line(&self, line: NewCartLine) -> Result<CartLine, RepositoryError>;

    /// Add `by` to the matching line's quantity and set `updated_at = at`.
    async fn increment_quantity(
        &self,
        filter: &LineFilter,
        by: Quantity,
        at: DateTime<Utc>,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Overwrite the matching line's quantity and set `updated_at = at`.
    async fn set_quantity(
        &self,
        filter: &LineFilter,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<Option<CartLine>, RepositoryError>;

    /// Delete at most one matching line, returning how many were deleted.
    async fn delete_line(&self, filter: &LineFilter) -> Result<u64, RepositoryError>;

    /// Whether [`CartStore::upsert_increment`] is available.
    fn supports_upsert(&self) -> bool {
        false
    }

    /// Atomically insert `line`, or add its quantity to the existing line for
    /// the same (user, product) pair.
    ///
    /// The existing line keeps its ID, `created_at`, context id and snapshot.
    async fn upsert_increment(&self, line: NewCartLine) -> Result<Reconciled, RepositoryError> {
        let _ = line;
        Err(RepositoryError::Unsupported("upsert_increment"))
    }

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// The product catalog.
///
/// The engine only reads from it (to capture snapshots); the product routes
/// use the rest.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up one product.
    async fn get(&self, id: &ProductIdentity) -> Result<Option<Product>, RepositoryError>;

    /// All products, in store-native order.
    async fn list(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Create a product.
    ///
    /// Returns `RepositoryError::Conflict` if the ID is taken.
    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError>;

    /// Delete a product, returning whether it existed.
    ///
    /// Cart lines referring to it are left alone, snapshots included.
    async fn delete(&self, id: &ProductIdentity) -> Result<bool, RepositoryError>;
}
