//! In-memory store collaborators.
//!
//! Used by tests and when the service runs without `CARTLINE_DATABASE_URL`.
//! Each operation takes the lock once, so individual calls are atomic; a
//! find followed by an insert is not.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cartline_core::{CartLineId, ProductIdentity, Quantity, UserIdentity};

use super::RepositoryError;
use crate::cart::{CartStore, LineFilter, ProductCatalog, Reconciled};
use crate::models::{CartLine, NewCartLine, NewProduct, Product};

fn poisoned(what: &str) -> RepositoryError {
    RepositoryError::Unavailable(format!("{what} lock poisoned"))
}

/// Cart lines kept in insertion order.
#[derive(Debug)]
pub struct MemoryCartStore {
    lines: Mutex<Vec<CartLine>>,
    upsert: bool,
}

impl Default for MemoryCartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCartStore {
    /// Create an empty store that offers atomic upsert.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            upsert: true,
        }
    }

    /// Create an empty store without the upsert primitive, forcing the
    /// engine onto its per-pair locks.
    #[must_use]
    pub const fn without_upsert() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            upsert: false,
        }
    }

    /// Number of stored lines across all users.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Unavailable` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, RepositoryError> {
        Ok(self.lines()?.len())
    }

    /// Whether the store holds no lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Unavailable` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, RepositoryError> {
        Ok(self.lines()?.is_empty())
    }

    fn lines(&self) -> Result<MutexGuard<'_, Vec<CartLine>>, RepositoryError> {
        self.lines.lock().map_err(|_| poisoned("cart store"))
    }

    /// Apply `update` to the first line matching `filter`.
    fn update_first(
        &self,
        filter: &LineFilter,
        update: impl FnOnce(&mut CartLine),
    ) -> Result<Option<CartLine>, RepositoryError> {
        let mut lines = self.lines()?;
        Ok(lines.iter_mut().find(|line| filter.matches(line)).map(|line| {
            update(line);
            line.clone()
        }))
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn find_line(&self, filter: &LineFilter) -> Result<Option<CartLine>, RepositoryError> {
        let found = self.lines()?.iter().find(|line| filter.matches(line)).cloned();
        // Give concurrent callers a chance to interleave, as a network store would
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn find_lines(&self, user: &UserIdentity) -> Result<Vec<CartLine>, RepositoryError> {
        Ok(self
            .lines()?
            .iter()
            .filter(|line| line.user_identity == *user)
            .cloned()
            .collect())
    }

    async fn insert_line(&self, line: NewCartLine) -> Result<CartLine, RepositoryError> {
        let line = line.into_line(CartLineId::generate());
        self.lines()?.push(line.clone());
        Ok(line)
    }

    async fn increment_quantity(
        &self,
        filter: &LineFilter,
        by: Quantity,
        at: DateTime<Utc>,
    ) -> Result<Option<CartLine>, RepositoryError> {
        self.update_first(filter, |line| {
            line.quantity = line.quantity.saturating_add(by);
            line.updated_at = at;
        })
    }

    async fn set_quantity(
        &self,
        filter: &LineFilter,
        quantity: Quantity,
        at: DateTime<Utc>,
    ) -> Result<Option<CartLine>, RepositoryError> {
        self.update_first(filter, |line| {
            line.quantity = quantity;
            line.updated_at = at;
        })
    }

    async fn delete_line(&self, filter: &LineFilter) -> Result<u64, RepositoryError> {
        let mut lines = self.lines()?;
        match lines.iter().position(|line| filter.matches(line)) {
            Some(index) => {
                lines.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn supports_upsert(&self) -> bool {
        self.upsert
    }

    async fn upsert_increment(&self, line: NewCartLine) -> Result<Reconciled, RepositoryError> {
        if !self.upsert {
            return Err(RepositoryError::Unsupported("upsert_increment"));
        }

        let filter = LineFilter::pair(line.user_identity.clone(), line.product_identity.clone());
        let mut lines = self.lines()?;
        if let Some(existing) = lines.iter_mut().find(|l| filter.matches(l)) {
            existing.quantity = existing.quantity.saturating_add(line.quantity);
            existing.updated_at = line.at;
            return Ok(Reconciled::Merged(existing.clone()));
        }

        let created = line.into_line(CartLineId::generate());
        lines.push(created.clone());
        Ok(Reconciled::Created(created))
    }
}

/// Products kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    products: Mutex<Vec<Product>>,
}

impl MemoryCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn products(&self) -> Result<MutexGuard<'_, Vec<Product>>, RepositoryError> {
        self.products.lock().map_err(|_| poisoned("catalog"))
    }
}

#[async_trait]
impl ProductCatalog for MemoryCatalog {
    async fn get(&self, id: &ProductIdentity) -> Result<Option<Product>, RepositoryError> {
        let found = self.products()?.iter().find(|p| p.id == *id).cloned();
        tokio::task::yield_now().await;
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products()?.clone())
    }

    async fn create(&self, product: NewProduct) -> Result<Product, RepositoryError> {
        let id = product.id.clone().unwrap_or_else(ProductIdentity::generate);
        let mut products = self.products()?;
        if products.iter().any(|p| p.id == id) {
            return Err(RepositoryError::Conflict("product already exists".to_owned()));
        }
        let product = product.into_product(id, Utc::now());
        products.push(product.clone());
        Ok(product)
    }

    async fn delete(&self, id: &ProductIdentity) -> Result<bool, RepositoryError> {
        let mut products = self.products()?;
        let before = products.len();
        products.retain(|p| p.id != *id);
        Ok(products.len() < before)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn new_line(user: &str, product: &str, quantity: u32) -> NewCartLine {
        NewCartLine {
            user_identity: UserIdentity::parse(user).unwrap(),
            user_context_id: None,
            product_identity: ProductIdentity::parse(product).unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
            product_snapshot: None,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_merges_into_existing_line() {
        let store = MemoryCartStore::new();
        let first = store.upsert_increment(new_line("a@x.com", "p1", 2)).await.unwrap();
        let second = store.upsert_increment(new_line("a@x.com", "p1", 3)).await.unwrap();

        assert!(first.is_created());
        assert!(!second.is_created());
        assert_eq!(second.line().id, first.line().id);
        assert_eq!(second.line().quantity.get(), 5);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_unavailable_when_disabled() {
        let store = MemoryCartStore::without_upsert();
        assert!(!store.supports_upsert());
        let err = store
            .upsert_increment(new_line("a@x.com", "p1", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_only_first_match() {
        let store = MemoryCartStore::new();
        store.insert_line(new_line("a@x.com", "p1", 1)).await.unwrap();
        store.insert_line(new_line("b@x.com", "p1", 1)).await.unwrap();

        let product = ProductIdentity::parse("p1").unwrap();
        let deleted = store.delete_line(&LineFilter::Product(product)).await.unwrap();

        assert_eq!(deleted, 1);
        let remaining = store
            .find_lines(&UserIdentity::parse("b@x.com").unwrap())
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_rejects_duplicate_ids() {
        let catalog = MemoryCatalog::new();
        let product = NewProduct {
            id: Some(ProductIdentity::parse("p1").unwrap()),
            name: "Pineapple".to_owned(),
            description: None,
            price: None,
            image_url: None,
        };
        catalog.create(product.clone()).await.unwrap();
        let err = catalog.create(product).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
