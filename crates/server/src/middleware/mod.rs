//! HTTP middleware stack for the cart service.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per request)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS

pub mod request_id;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
