//! Domain models for the cart service.
//!
//! These types are what the engine and routes pass around; database row
//! types live next to their queries in [`crate::db`].

pub mod cart_line;
pub mod product;

pub use cart_line::{CartLine, NewCartLine, ProductSnapshot};
pub use product::{NewProduct, Product};
