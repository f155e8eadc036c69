//! Ecom24 Core - Shared domain types.
//!
//! This crate provides the types used across all Ecom24 components:
//! - `api` - The storefront REST API
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure helpers - no I/O, no database
//! access, no HTTP clients. The optional `postgres` feature adds `sqlx`
//! encode/decode support for the ID newtypes.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, statuses, email and money helpers
//! - [`models`] - Persisted entity records (products, orders, users, ...)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;

pub use models::*;
pub use types::*;
