//! Cart line domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartline_core::{CartLineId, Price, ProductIdentity, Quantity, UserIdentity};

use super::Product;

/// One product's presence in one user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Store-assigned ID, immutable.
    pub id: CartLineId,
    /// Cart owner.
    pub user_identity: UserIdentity,
    /// Separately issued user id recorded when the line was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_context_id: Option<String>,
    /// Referenced product.
    pub product_identity: ProductIdentity,
    /// Item count, at least 1.
    pub quantity: Quantity,
    /// Product attributes as they were when the line was created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_snapshot: Option<ProductSnapshot>,
    /// When the line was created.
    pub created_at: DateTime<Utc>,
    /// When the line was last mutated.
    pub updated_at: DateTime<Utc>,
}

/// A cart line that has not been stored yet.
///
/// The store assigns the ID; both timestamps are set to `at`.
#[derive(Debug, Clone)]
pub struct NewCartLine {
    pub user_identity: UserIdentity,
    pub user_context_id: Option<String>,
    pub product_identity: ProductIdentity,
    pub quantity: Quantity,
    pub product_snapshot: Option<ProductSnapshot>,
    pub at: DateTime<Utc>,
}

impl NewCartLine {
    /// Materialize the line under a store-assigned ID.
    #[must_use]
    pub fn into_line(self, id: CartLineId) -> CartLine {
        CartLine {
            id,
            user_identity: self.user_identity,
            user_context_id: self.user_context_id,
            product_identity: self.product_identity,
            quantity: self.quantity,
            product_snapshot: self.product_snapshot,
            created_at: self.at,
            updated_at: self.at,
        }
    }
}

/// Denormalized copy of product attributes, for display without a join.
///
/// Captured exactly once, when the line is inserted. Merges, quantity
/// updates and later catalog edits never touch it, so it can go stale; the
/// cart shows what the product looked like when it was first added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl ProductSnapshot {
    /// Copy the display attributes of `product`.
    #[must_use]
    pub fn capture(product: &Product, at: DateTime<Utc>) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            captured_at: at,
        }
    }
}
