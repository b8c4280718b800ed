//! Cartline Core - Shared value types.
//!
//! This crate provides the value types used across all Cartline components:
//! - `server` - HTTP cart service and reconciliation engine
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP.
//! Every inbound identity and quantity is coerced into one of these types at
//! the boundary, so the rest of the system never sees raw JSON values.
//!
//! # Modules
//!
//! - [`types`] - Identities, quantities, line IDs and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
