//! Core types for Delicious.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! the web server and the CLI.

pub mod email;
pub mod geo;
pub mod id;
pub mod pagination;
pub mod rating;
pub mod slug;
pub mod tag;

pub use email::{Email, EmailError};
pub use geo::{EARTH_RADIUS_METERS, GeoError, GeoPoint, Location, NearQuery};
pub use id::*;
pub use pagination::{PageOutcome, Pagination};
pub use rating::{Rating, RatingError};
pub use slug::{Slug, SlugError};
pub use tag::{TagCount, normalize_tags};
