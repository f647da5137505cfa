//! Delicious Core - Shared domain types.
//!
//! This crate provides the types and pure logic used by the other Delicious
//! components:
//! - `web` - The public site and JSON API
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP. Everything here can be tested without a
//! running database.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, emails, slugs, geo points, pagination and ratings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
