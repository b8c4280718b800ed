//! HTTP route handlers for the cart service.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness check
//! GET    /health/ready              - Readiness check (store ping)
//!
//! # Cart
//! GET    /cart/{userIdentity}       - List a user's cart
//! POST   /cart                      - Add to cart (merges quantities)
//! PATCH  /cart/{productIdentity}    - Set a line's quantity
//! DELETE /cart/{productIdentity}    - Remove a line (?userIdentity=)
//!
//! # Products
//! GET    /products                  - Catalog listing
//! GET    /products/{id}             - Product detail
//! POST   /products                  - Create product
//! DELETE /products/{id}             - Delete product
//! ```

pub mod cart;
pub mod products;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Create the cart routes router.
///
/// `GET /cart/{id}` takes a user identity while `PATCH` and `DELETE` on the
/// same path take a product identity.
pub fn cart_routes() -> Router<AppState> {
    Router::new().route("/", axum::routing::post(cart::add)).route(
        "/{identity}",
        get(cart::list).patch(cart::update).delete(cart::remove),
    )
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/{id}", get(products::show).delete(products::delete))
}

/// Create all routes for the service.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/cart", cart_routes())
        .nest("/products", product_routes())
}

/// Build the full application: routes, state and middleware.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config().cors_allowed_origins);

    routes()
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::extract::Request| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .layer(cors)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS for the configured origins; any origin when the list is empty.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    if origins.is_empty() {
        return base.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(allowed))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Pings the cart store; 503 if it is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.engine().store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
