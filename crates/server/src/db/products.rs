//! `PostgreSQL` product catalog.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use cartline_core::{CurrencyCode, Price, ProductIdentity};

use super::RepositoryError;
use crate::cart::ProductCatalog;
use crate::models::{NewProduct, Product};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price_amount, price_currency, image_url, created_at, updated_at";

/// Product catalog backed by `cartline.product`.
#[derive(Clone)]
pub struct PgProductCatalog {
    pool: PgPool,
}

#[derive(FromRow)]
struct ProductRow {
    id: ProductIdentity,
    name: String,
    description: Option<String>,
    price_amount: Option<Decimal>,
    price_currency: Option<String>,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let price = match (row.price_amount, row.price_currency) {
            (Some(amount), Some(currency)) => {
                let code = currency.parse::<CurrencyCode>().map_err(|e| {
                    RepositoryError::DataCorruption(format!("invalid currency in database: {e}"))
                })?;
                Some(Price::new(amount, code))
            }
            (None, None) => None,
            _ => {
                return Err(RepositoryError::DataCorruption(format!(
                    "product {} has a partial price",
                    row.id
                )));
            }
        };

        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price,
            image_url: row.image_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl PgProductCatalog {
    /// Create a new catalog on top of a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert or replace a product by ID.
    ///
    /// Used by catalog seeding, where re-running the same file must not fail.
    /// `created_at` is preserved for existing products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Invalid` if the product has no ID or a
    /// blank name, `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        if product.validated_name().is_none() {
            return Err(RepositoryError::Invalid("product name is blank".to_owned()));
        }
        let Some(id) = product.id.clone() else {
            return Err(RepositoryError::Invalid(
                "seeded products need an explicit id".to_owned(),
            ));
        };
        let product = product.into_product(id, Utc::now());

        let sql = format!(
            "INSERT INTO cartline.product ({PRODUCT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT (id) DO UPDATE \
             SET name = EXCLUDED.name, description = EXCLUDED.description, \
                 price_amount = EXCLUDED.price_amount, price_currency = EXCLUDED.price_currency, \
                 image_url = EXCLUDED.image_url, updated_at = EXCLUDED.updated_at \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(product.id)
            .bind(product.name)
            .bind(product.description)
            .bind(product.price.map(|p| p.amount))
            .bind(product.price.map(|p| p.currency_code.as_str()))
            .bind(product.image_url)
            .bind(product.created_at)
            .fetch_one(&self.pool)
            .await?;

        Product::try_from(row)
    }
}

#[async_trait]
impl ProductCatalog for PgProductCatalog {
    async fn get(&self, id: &ProductIdentity) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM cartline.product WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id.clone())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM cartline.product ORDER BY created_at, id");
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let id = product.id.clone().unwrap_or_else(ProductIdentity::generate);
        let product = product.into_product(id, Utc::now());

        let sql = format!(
            "INSERT INTO cartline.product ({PRODUCT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {PRODUCT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(product.id)
            .bind(product.name)
            .bind(product.description)
            .bind(product.price.map(|p| p.amount))
            .bind(product.price.map(|p| p.currency_code.as_str()))
            .bind(product.image_url)
            .bind(product.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "product"))?;

        Product::try_from(row)
    }

    async fn delete(&self, id: &ProductIdentity) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cartline.product WHERE id = $1")
            .bind(id.clone())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
