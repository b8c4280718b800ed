//! Core types for Cartline.
//!
//! This module provides type-safe wrappers for cart domain concepts.

pub mod id;
pub mod identity;
pub mod price;
pub mod quantity;

pub use id::CartLineId;
pub use identity::{IdentityError, ProductIdentity, UserIdentity};
pub use price::{CurrencyCode, Price, UnknownCurrency};
pub use quantity::{Quantity, QuantityError};
