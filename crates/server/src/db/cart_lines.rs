//! `PostgreSQL` cart line store.
//!
//! Queries are built at runtime (`query_as` + `FromRow`) because the filter
//! shape decides the `WHERE` clause. Every single-line operation resolves its
//! target through one `id` subquery so scoped and global filters share SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres};

use cartline_core::{CartLineId, ProductIdentity, Quantity, UserIdentity};

use super::RepositoryError;
use crate::cart::{CartStore, LineFilter, Reconciled};
use crate::models::{CartLine, NewCartLine, ProductSnapshot};

const LINE_COLUMNS: &str = "id, user_identity, user_context_id, product_identity, quantity, \
                            product_snapshot, created_at, updated_at";

/// Cart line store backed by `cartline.cart_line`.
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    /// Create a new store on top of a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct CartLineRow {
    id: CartLineId,
    user_identity: UserIdentity,
    user_context_id: Option<String>,
    product_identity: ProductIdentity,
    quantity: i32,
    product_snapshot: Option<Json<ProductSnapshot>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = RepositoryError;

    fn try_from(row: CartLineRow) -> Result<Self, Self::Error> {
        let quantity = Quantity::try_from(row.quantity).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid quantity in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            user_identity: row.user_identity,
            user_context_id: row.user_context_id,
            product_identity: row.product_identity,
            quantity,
            product_snapshot: row.product_snapshot.map(|Json(snapshot)| snapshot),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    line: CartLineRow,
    inserted: bool,
}

/// Subquery selecting the ID of the single line `filter` targets.
///
/// Placeholders start at `$first`.
fn target_id(filter: &LineFilter, first: usize) -> String {
    match filter {
        LineFilter::Pair { .. } => format!(
            "SELECT id FROM cartline.cart_line \
             WHERE user_identity = ${first} AND product_identity = ${} \
             LIMIT 1",
            first + 1
        ),
        LineFilter::Product(_) => format!(
            "SELECT id FROM cartline.cart_line \
             WHERE product_identity = ${first} \
             ORDER BY created_at, id LIMIT 1"
        ),
    }
}

fn bind_filter<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    filter: &LineFilter,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    match filter {
        LineFilter::Pair { user, product } => query.bind(user.clone()).bind(product.clone()),
        LineFilter::Product(product) => query.bind(product.clone()),
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn find_line(&self, filter: &LineFilter) -> Result<Option<CartLine>, RepositoryError> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM cartline.cart_line WHERE id = ({})",
            target_id(filter, 1)
        );
        let row = bind_filter(sqlx::query_as::<_, CartLineRow>(&sql), filter)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn find_lines(&self, user: &UserIdentity) -> Result<Vec<CartLine>, RepositoryError> {
        let sql = format!(
            "SELECT {LINE_COLUMNS} FROM cartline.cart_line \
             WHERE user_identity = $1 ORDER BY created_at, id"
        );
        let rows = sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(user.clone())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(CartLine::try_from).collect()
    }

    async fn insert_line(&self, line: NewCartLine) -> Result<CartLine, RepositoryError> {
        let sql = format!(
            "INSERT INTO cartline.cart_line ({LINE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             RETURNING {LINE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(CartLineId::generate())
            .bind(line.user_identity)
            .bind(line.user_context_id)
            .bind(line.product_identity)
            .bind(line.quantity.as_i32())
            .bind(line.product_snapshot.map(Json))
            .bind(line.at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::from_insert(e, "cart line"))?;

        CartLine::try_from(row)
    }

    async fn increment_quantity(
        &self,
        filter: &LineFilter,
        by: Quantity,
        at: DateTime<Utc>,
    ) -> Result<Option<CartLine>, RepositoryError> {
        // Saturate at i32::MAX instead of failing on overflow
        let sql = format!(
            "UPDATE cartline.cart_line \
             SET quantity = LEAST(quantity::bigint + $1, 2147483647)::integer, updated_at = $2 \
             WHERE id = ({}) \
             RETURNING {LINE_COLUMNS}",
            target_id(filter, 3)
        );
        let query = sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(i64::from(by.get()))
            .bind(at);
        let row = bind_filter(query, filter)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn set_quantity(
        &self,
        filter: &LineFilter,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<Option<CartLine>, RepositoryError> {
        let sql = format!(
            "UPDATE cartline.cart_line SET quantity = $1, updated_at = $2 \
             WHERE id = ({}) \
             RETURNING {LINE_COLUMNS}",
            target_id(filter, 3)
        );
        let query = sqlx::query_as::<_, CartLineRow>(&sql)
            .bind(quantity.as_i32())
            .bind(at);
        let row = bind_filter(query, filter)
            .fetch_optional(&self.pool)
            .await?;

        row.map(CartLine::try_from).transpose()
    }

    async fn delete_line(&self, filter: &LineFilter) -> Result<u64, RepositoryError> {
        let sql = format!(
            "DELETE FROM cartline.cart_line WHERE id = ({}) RETURNING id",
            target_id(filter, 1)
        );
        let deleted = bind_filter(sqlx::query_as::<_, (CartLineId,)>(&sql), filter)
            .fetch_optional(&self.pool)
            .await?;

        Ok(u64::from(deleted.is_some()))
    }

    fn supports_upsert(&self) -> bool {
        true
    }

    async fn upsert_increment(&self, line: NewCartLine) -> Result<Reconciled, RepositoryError> {
        // xmax = 0 only for rows created by this statement
        let sql = format!(
            "INSERT INTO cartline.cart_line ({LINE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7) \
             ON CONFLICT (user_identity, product_identity) DO UPDATE \
             SET quantity = LEAST(cartline.cart_line.quantity::bigint + EXCLUDED.quantity, 2147483647)::integer, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {LINE_COLUMNS}, (xmax = 0) AS inserted"
        );
        let row = sqlx::query_as::<_, UpsertRow>(&sql)
            .bind(CartLineId::generate())
            .bind(line.user_identity)
            .bind(line.user_context_id)
            .bind(line.product_identity)
            .bind(line.quantity.as_i32())
            .bind(line.product_snapshot.map(Json))
            .bind(line.at)
            .fetch_one(&self.pool)
            .await?;

        let inserted = row.inserted;
        let line = CartLine::try_from(row.line)?;
        Ok(if inserted {
            Reconciled::Created(line)
        } else {
            Reconciled::Merged(line)
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
