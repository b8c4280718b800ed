//! Cartline cart service library.
//!
//! This crate provides the cart reconciliation engine, its stores and the
//! HTTP adapter as a library, allowing them to be tested and reused.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;

pub use routes::app;
