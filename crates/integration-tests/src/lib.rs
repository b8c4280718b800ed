//! Integration tests for Cartline.
//!
//! Drives the full axum application (routes, middleware, engine) in-process
//! with `tower::ServiceExt::oneshot`, backed by the in-memory stores. No
//! database or running server is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartline-integration-tests
//! ```

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use cartline_core::ProductIdentity;
use cartline_server::cart::{CartStore, ProductCatalog};
use cartline_server::config::CartlineConfig;
use cartline_server::db::{MemoryCartStore, MemoryCatalog};
use cartline_server::models::NewProduct;
use cartline_server::state::AppState;

/// A response reduced to what tests assert on.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body, or `Value::String` for non-JSON bodies.
    pub body: Value,
}

/// An in-process application with handles on its stores.
pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryCartStore>,
    pub catalog: Arc<MemoryCatalog>,
}

impl TestApp {
    /// Application with default configuration and the given catalog products.
    ///
    /// # Panics
    ///
    /// Panics if a product id is invalid or duplicated.
    pub async fn with_products(ids: &[&str]) -> Self {
        Self::build(CartlineConfig::default(), MemoryCartStore::new(), ids).await
    }

    /// Application with a custom configuration and store flavour.
    ///
    /// # Panics
    ///
    /// Panics if a product id is invalid or duplicated.
    pub async fn build(config: CartlineConfig, store: MemoryCartStore, ids: &[&str]) -> Self {
        let store = Arc::new(store);
        let catalog = Arc::new(MemoryCatalog::new());
        for id in ids {
            catalog
                .create(NewProduct {
                    id: Some(ProductIdentity::parse(id).expect("valid product id")),
                    name: format!("Product {id}"),
                    description: None,
                    price: None,
                    image_url: None,
                })
                .await
                .expect("seed product");
        }

        let state = AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn CartStore>,
            Arc::clone(&catalog) as Arc<dyn ProductCatalog>,
        );

        Self {
            router: cartline_server::app(state),
            store,
            catalog,
        }
    }

    /// Send one request through the full middleware stack.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.send(Method::DELETE, uri, None).await
    }
}
