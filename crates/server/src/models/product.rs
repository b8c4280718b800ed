//! Catalog product domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cartline_core::{Price, ProductIdentity};

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductIdentity,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating (or seeding) a product.
///
/// When `id` is absent the catalog generates one.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[serde(default)]
    pub id: Option<ProductIdentity>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewProduct {
    /// Trimmed name, or `None` when blank.
    #[must_use]
    pub fn validated_name(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Materialize the product under its final ID.
    #[must_use]
    pub fn into_product(self, id: ProductIdentity, at: DateTime<Utc>) -> Product {
        let name = self.name.trim().to_owned();
        Product {
            id,
            name,
            description: self.description,
            price: self.price,
            image_url: self.image_url,
            created_at: at,
            updated_at: at,
        }
    }
}
