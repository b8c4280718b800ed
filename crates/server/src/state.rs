//! Application state shared across handlers.

use std::sync::Arc;

use crate::cart::{CartEngine, CartStore, ProductCatalog};
use crate::config::CartlineConfig;
use crate::db::{MemoryCartStore, MemoryCatalog};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// cart engine, the product catalog and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: CartlineConfig,
    engine: CartEngine,
    catalog: Arc<dyn ProductCatalog>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration; supplies the match scope and
    ///   snapshot policy for the engine
    /// * `store` - Cart line persistence
    /// * `catalog` - Product catalog
    #[must_use]
    pub fn new(
        config: CartlineConfig,
        store: Arc<dyn CartStore>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        let engine = CartEngine::new(store, Arc::clone(&catalog))
            .with_match_scope(config.match_scope)
            .with_snapshot_policy(config.snapshot_policy);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                engine,
                catalog,
            }),
        }
    }

    /// Create a state backed by empty in-memory stores.
    #[must_use]
    pub fn in_memory(config: CartlineConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryCartStore::new()),
            Arc::new(MemoryCatalog::new()),
        )
    }

    /// Get a reference to the service configuration.
    #[must_use]
    pub fn config(&self) -> &CartlineConfig {
        &self.inner.config
    }

    /// Get a reference to the cart engine.
    #[must_use]
    pub fn engine(&self) -> &CartEngine {
        &self.inner.engine
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &dyn ProductCatalog {
        self.inner.catalog.as_ref()
    }
}
