//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Registration, login, profile edits and password resets
//! - `email` - Password reset mail (SMTP or log-only)
//! - `stores` - Store form validation, ownership, slugs and rankings
//! - `uploads` - Photo validation, resize and storage

pub mod auth;
pub mod email;
pub mod stores;
pub mod uploads;
