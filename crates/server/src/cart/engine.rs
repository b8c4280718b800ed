//! The cart reconciliation engine.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use cartline_core::{ProductIdentity, UserIdentity};

use super::{
    AddToCart, AddToCartRequest, CartError, CartStore, LineFilter, MatchScope, PairLocks,
    ProductCatalog, Reconciled, SnapshotPolicy, UpdateQuantityRequest,
};
use crate::models::{CartLine, NewCartLine, ProductSnapshot};

/// Reconciles add-to-cart, quantity update and removal requests against the
/// store.
///
/// Holds no cart state of its own. The only in-process state is the
/// [`PairLocks`] arena, which is used when the store cannot upsert atomically.
/// Cheap to clone.
#[derive(Clone)]
pub struct CartEngine {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn ProductCatalog>,
    locks: Arc<PairLocks>,
    match_scope: MatchScope,
    snapshot_policy: SnapshotPolicy,
}

impl CartEngine {
    /// Create an engine with the default scope and snapshot policy.
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            store,
            catalog,
            locks: Arc::new(PairLocks::new()),
            match_scope: MatchScope::default(),
            snapshot_policy: SnapshotPolicy::default(),
        }
    }

    /// Set how updates and removals locate their line.
    #[must_use]
    pub const fn with_match_scope(mut self, scope: MatchScope) -> Self {
        self.match_scope = scope;
        self
    }

    /// Set how the catalog is consulted on insert.
    #[must_use]
    pub const fn with_snapshot_policy(mut self, policy: SnapshotPolicy) -> Self {
        self.snapshot_policy = policy;
        self
    }

    /// The configured match scope.
    #[must_use]
    pub const fn match_scope(&self) -> MatchScope {
        self.match_scope
    }

    /// The underlying cart store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CartStore> {
        &self.store
    }

    /// Add a product to a user's cart, merging into the existing line if one
    /// exists.
    ///
    /// Performs exactly one store write. When the store supports atomic
    /// upsert the insert path is an upsert, so a concurrent add for the same
    /// pair collapses into a merge; otherwise the find-then-write sequence
    /// runs under the pair's lock.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidRequest` for missing or malformed fields
    /// - `CartError::NotFound` when the snapshot policy is `Require` and the
    ///   product is not in the catalog
    /// - `CartError::Store` when a store call fails
    pub async fn add_or_merge(&self, request: AddToCartRequest) -> Result<Reconciled, CartError> {
        let add = request.validate()?;
        self.reconcile(add).await
    }

    #[instrument(
        skip(self, add),
        fields(user = %add.user_identity, product = %add.product_identity, quantity = %add.quantity)
    )]
    async fn reconcile(&self, add: AddToCart) -> Result<Reconciled, CartError> {
        let upsert = self.store.supports_upsert();
        let _guard = if upsert {
            None
        } else {
            Some(self.locks.lock(&add.user_identity, &add.product_identity).await)
        };

        let filter = LineFilter::pair(add.user_identity.clone(), add.product_identity.clone());
        if self.store.find_line(&filter).await?.is_some() {
            let merged = self
                .store
                .increment_quantity(&filter, add.quantity, Utc::now())
                .await?;
            if let Some(line) = merged {
                tracing::info!(line_id = %line.id, total = %line.quantity, "Merged into cart line");
                return Ok(Reconciled::Merged(line));
            }
            // Removed between the lookup and the increment; treat as absent
            tracing::debug!("Cart line vanished before merge, inserting");
        }

        let at = Utc::now();
        let product_snapshot = self.capture_snapshot(&add.product_identity, at).await?;
        let new_line = NewCartLine {
            user_identity: add.user_identity,
            user_context_id: add.user_context_id,
            product_identity: add.product_identity,
            quantity: add.quantity,
            product_snapshot,
            at,
        };

        let reconciled = if upsert {
            self.store.upsert_increment(new_line).await?
        } else {
            Reconciled::Created(self.store.insert_line(new_line).await?)
        };

        let line = reconciled.line();
        if reconciled.is_created() {
            tracing::info!(line_id = %line.id, "Created cart line");
        } else {
            tracing::info!(line_id = %line.id, total = %line.quantity, "Merged into cart line on conflict");
        }
        Ok(reconciled)
    }

    /// Resolve the one-time product snapshot for a line about to be inserted.
    async fn capture_snapshot(
        &self,
        product: &ProductIdentity,
        at: chrono::DateTime<Utc>,
    ) -> Result<Option<ProductSnapshot>, CartError> {
        if self.snapshot_policy == SnapshotPolicy::Skip {
            return Ok(None);
        }

        match self.catalog.get(product).await? {
            Some(found) => Ok(Some(ProductSnapshot::capture(&found, at))),
            None if self.snapshot_policy == SnapshotPolicy::Require => {
                Err(CartError::NotFound(format!("product {product}")))
            }
            None => {
                tracing::debug!(%product, "Product not in catalog, inserting without snapshot");
                Ok(None)
            }
        }
    }

    /// Overwrite the quantity of an existing line.
    ///
    /// Never creates a line.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidRequest` if the user is missing or the quantity
    ///   is missing, non-numeric or below 1
    /// - `CartError::NotFound` if no line matches
    /// - `CartError::Store` when the store call fails
    #[instrument(skip(self, request), fields(%product))]
    pub async fn set_quantity(
        &self,
        product: ProductIdentity,
        request: UpdateQuantityRequest,
    ) -> Result<CartLine, CartError> {
        let (user, quantity) = request.validate()?;
        let filter = self.match_scope.filter(Some(user), product)?;

        let updated = self
            .store
            .set_quantity(&filter, quantity, Utc::now())
            .await?
            .ok_or_else(|| CartError::NotFound(format!("cart line for product {}", filter.product())))?;

        tracing::info!(line_id = %updated.id, %quantity, "Updated cart line quantity");
        Ok(updated)
    }

    /// Delete one line.
    ///
    /// Under `MatchScope::Scoped` the user is required; under
    /// `MatchScope::Global` it is ignored.
    ///
    /// # Errors
    ///
    /// - `CartError::InvalidRequest` if the scope needs a user and none was given
    /// - `CartError::NotFound` if no line matches
    /// - `CartError::Store` when the store call fails
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user: Option<UserIdentity>,
        product: ProductIdentity,
    ) -> Result<u64, CartError> {
        let filter = self.match_scope.filter(user, product)?;
        let deleted = self.store.delete_line(&filter).await?;
        if deleted == 0 {
            return Err(CartError::NotFound(format!(
                "cart line for product {}",
                filter.product()
            )));
        }

        tracing::info!(deleted, "Removed cart line");
        Ok(deleted)
    }

    /// All lines in a user's cart, in store-native order.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Store` when the store call fails.
    #[instrument(skip(self))]
    pub async fn list(&self, user: &UserIdentity) -> Result<Vec<CartLine>, CartError> {
        Ok(self.store.find_lines(user).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::db::{MemoryCartStore, MemoryCatalog, RepositoryError};
    use crate::models::NewProduct;

    async fn catalog_with(ids: &[&str]) -> Arc<MemoryCatalog> {
        let catalog = Arc::new(MemoryCatalog::new());
        for id in ids {
            catalog
                .create(NewProduct {
                    id: Some(ProductIdentity::parse(id).unwrap()),
                    name: format!("Product {id}"),
                    description: None,
                    price: None,
                    image_url: None,
                })
                .await
                .unwrap();
        }
        catalog
    }

    async fn engine_with(store: Arc<MemoryCartStore>) -> CartEngine {
        CartEngine::new(store, catalog_with(&["p1", "p2", "42"]).await)
    }

    fn add(user: &str, product: Value, quantity: Option<Value>) -> AddToCartRequest {
        AddToCartRequest {
            user_identity: Some(json!(user)),
            user_context_id: None,
            product_identity: Some(product),
            quantity,
        }
    }

    fn update(user: &str, quantity: Value) -> UpdateQuantityRequest {
        UpdateQuantityRequest {
            user_email: Some(json!(user)),
            quantity: Some(quantity),
        }
    }

    fn user(s: &str) -> UserIdentity {
        UserIdentity::parse(s).unwrap()
    }

    fn product(s: &str) -> ProductIdentity {
        ProductIdentity::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_merge_scenario() {
        let engine = engine_with(Arc::new(MemoryCartStore::new())).await;

        let first = engine
            .add_or_merge(add("a@x.com", json!("p1"), Some(json!(2))))
            .await
            .unwrap();
        assert!(first.is_created());
        assert_eq!(first.line().quantity.get(), 2);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let second = engine
            .add_or_merge(add("a@x.com", json!("p1"), Some(json!(3))))
            .await
            .unwrap();
        assert!(!second.is_created());
        let merged = second.line();
        assert_eq!(merged.id, first.line().id);
        assert_eq!(merged.quantity.get(), 5);
        assert_eq!(merged.created_at, first.line().created_at);
        assert!(merged.updated_at > first.line().updated_at);

        let lines = engine.list(&user("a@x.com")).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_identity.as_str(), "p1");
        assert_eq!(lines[0].quantity.get(), 5);
    }

    #[tokio::test]
    async fn test_repeated_adds_sum_quantities() {
        for store in [MemoryCartStore::new(), MemoryCartStore::without_upsert()] {
            let store = Arc::new(store);
            let engine = engine_with(Arc::clone(&store)).await;

            for q in [1, 4, 2, 7] {
                engine
                    .add_or_merge(add("a@x.com", json!("p2"), Some(json!(q))))
                    .await
                    .unwrap();
            }

            let lines = engine.list(&user("a@x.com")).await.unwrap();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].quantity.get(), 14);
            assert_eq!(store.len().unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_default_quantity_is_one() {
        let engine = engine_with(Arc::new(MemoryCartStore::new())).await;
        let line = engine
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap()
            .into_line();
        assert_eq!(line.quantity.get(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_keep_one_line() {
        for store in [MemoryCartStore::new(), MemoryCartStore::without_upsert()] {
            let store = Arc::new(store);
            let engine = engine_with(Arc::clone(&store)).await;

            let tasks: Vec<_> = (0..32)
                .map(|_| {
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        engine
                            .add_or_merge(add("a@x.com", json!("p1"), Some(json!(1))))
                            .await
                    })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }

            let lines = engine.list(&user("a@x.com")).await.unwrap();
            assert_eq!(lines.len(), 1);
            assert_eq!(lines[0].quantity.get(), 32);
        }
    }

    #[tokio::test]
    async fn test_integer_product_identity_matches_string_form() {
        let engine = engine_with(Arc::new(MemoryCartStore::new())).await;
        engine
            .add_or_merge(add("a@x.com", json!(42), Some(json!(1))))
            .await
            .unwrap();
        let merged = engine
            .add_or_merge(add("a@x.com", json!("42"), Some(json!(1))))
            .await
            .unwrap();
        assert!(!merged.is_created());
        assert_eq!(merged.line().quantity.get(), 2);
    }

    #[tokio::test]
    async fn test_missing_fields_do_not_touch_store() {
        let store = Arc::new(MemoryCartStore::new());
        let engine = engine_with(Arc::clone(&store)).await;

        let mut request = add("a@x.com", json!("p1"), None);
        request.user_identity = None;
        let err = engine.add_or_merge(request).await.unwrap_err();
        assert!(matches!(err, CartError::InvalidRequest(_)));

        let mut request = add("a@x.com", json!("p1"), None);
        request.product_identity = None;
        let err = engine.add_or_merge(request).await.unwrap_err();
        assert!(matches!(err, CartError::InvalidRequest(_)));

        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_snapshot_policies() {
        let store = Arc::new(MemoryCartStore::new());
        let engine = engine_with(Arc::clone(&store)).await;

        let err = engine
            .add_or_merge(add("a@x.com", json!("unknown"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::NotFound(_)));
        assert!(store.is_empty().unwrap());

        let lenient = engine.clone().with_snapshot_policy(SnapshotPolicy::BestEffort);
        let line = lenient
            .add_or_merge(add("a@x.com", json!("unknown"), None))
            .await
            .unwrap()
            .into_line();
        assert!(line.product_snapshot.is_none());

        let known = lenient
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap()
            .into_line();
        assert_eq!(known.product_snapshot.unwrap().name, "Product p1");

        let skipping = engine.with_snapshot_policy(SnapshotPolicy::Skip);
        let line = skipping
            .add_or_merge(add("b@x.com", json!("p1"), None))
            .await
            .unwrap()
            .into_line();
        assert!(line.product_snapshot.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_not_refreshed_on_merge() {
        let store = Arc::new(MemoryCartStore::new());
        let catalog = catalog_with(&["p1"]).await;
        let engine = CartEngine::new(store, Arc::clone(&catalog) as Arc<dyn ProductCatalog>);

        engine
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap();

        // Rename the product in the catalog
        catalog.delete(&product("p1")).await.unwrap();
        catalog
            .create(NewProduct {
                id: Some(product("p1")),
                name: "Renamed".to_owned(),
                description: None,
                price: None,
                image_url: None,
            })
            .await
            .unwrap();

        let merged = engine
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap()
            .into_line();
        assert_eq!(merged.product_snapshot.unwrap().name, "Product p1");
    }

    #[tokio::test]
    async fn test_set_quantity_overwrites() {
        let engine = engine_with(Arc::new(MemoryCartStore::new())).await;
        let created = engine
            .add_or_merge(add("a@x.com", json!("p1"), Some(json!(2))))
            .await
            .unwrap()
            .into_line();

        let updated = engine
            .set_quantity(product("p1"), update("a@x.com", json!("9")))
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.quantity.get(), 9);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_set_quantity_missing_line_is_not_found_and_creates_nothing() {
        let store = Arc::new(MemoryCartStore::new());
        let engine = engine_with(Arc::clone(&store)).await;

        let err = engine
            .set_quantity(product("p1"), update("a@x.com", json!(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::NotFound(_)));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_set_quantity_rejects_bad_input_without_changes() {
        let engine = engine_with(Arc::new(MemoryCartStore::new())).await;
        engine
            .add_or_merge(add("a@x.com", json!("p1"), Some(json!(4))))
            .await
            .unwrap();

        for bad in [json!(0), json!("lots"), json!(-1)] {
            let err = engine
                .set_quantity(product("p1"), update("a@x.com", bad))
                .await
                .unwrap_err();
            assert!(matches!(err, CartError::InvalidRequest(_)));
        }

        let missing_user = UpdateQuantityRequest {
            user_email: None,
            quantity: Some(json!(2)),
        };
        let err = engine
            .set_quantity(product("p1"), missing_user)
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::InvalidRequest(_)));

        let lines = engine.list(&user("a@x.com")).await.unwrap();
        assert_eq!(lines[0].quantity.get(), 4);
    }

    #[tokio::test]
    async fn test_remove_scoped() {
        let engine = engine_with(Arc::new(MemoryCartStore::new())).await;
        engine
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap();
        engine
            .add_or_merge(add("a@x.com", json!("p2"), None))
            .await
            .unwrap();

        let err = engine.remove(None, product("p1")).await.unwrap_err();
        assert!(matches!(err, CartError::InvalidRequest(_)));

        let err = engine
            .remove(Some(user("b@x.com")), product("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::NotFound(_)));

        let deleted = engine
            .remove(Some(user("a@x.com")), product("p1"))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let lines = engine.list(&user("a@x.com")).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_identity.as_str(), "p2");

        let err = engine
            .remove(Some(user("a@x.com")), product("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_global_matches_product_only() {
        let engine = engine_with(Arc::new(MemoryCartStore::new()))
            .await
            .with_match_scope(MatchScope::Global);
        engine
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap();
        engine
            .add_or_merge(add("b@x.com", json!("p1"), None))
            .await
            .unwrap();

        assert_eq!(engine.remove(None, product("p1")).await.unwrap(), 1);

        // Oldest line goes first
        assert!(engine.list(&user("a@x.com")).await.unwrap().is_empty());
        assert_eq!(engine.list(&user("b@x.com")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_is_per_user() {
        let engine = engine_with(Arc::new(MemoryCartStore::new())).await;
        engine
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap();
        engine
            .add_or_merge(add("b@x.com", json!("p2"), None))
            .await
            .unwrap();

        let lines = engine.list(&user("a@x.com")).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(engine.list(&user("nobody")).await.unwrap().is_empty());
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl CartStore for FailingStore {
        async fn find_line(&self, _: &LineFilter) -> Result<Option<CartLine>, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_owned()))
        }

        async fn find_lines(&self, _: &UserIdentity) -> Result<Vec<CartLine>, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_owned()))
        }

        async fn insert_line(&self, _: NewCartLine) -> Result<CartLine, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_owned()))
        }

        async fn increment_quantity(
            &self,
            _: &LineFilter,
            _: cartline_core::Quantity,
            _: chrono::DateTime<Utc>,
        ) -> Result<Option<CartLine>, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_owned()))
        }

        async fn set_quantity(
            &self,
            _: &LineFilter,
            _: cartline_core::Quantity,
            _: chrono::DateTime<Utc>,
        ) -> Result<Option<CartLine>, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_owned()))
        }

        async fn delete_line(&self, _: &LineFilter) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Unavailable("down".to_owned()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_surface_as_store_errors() {
        let engine = CartEngine::new(Arc::new(FailingStore), catalog_with(&["p1"]).await);

        let err = engine
            .add_or_merge(add("a@x.com", json!("p1"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Store(_)));

        let err = engine.list(&user("a@x.com")).await.unwrap_err();
        assert!(matches!(err, CartError::Store(_)));

        let err = engine
            .remove(Some(user("a@x.com")), product("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::Store(_)));
    }
}
