//! Domain models for the web server.
//!
//! Row structs (`sqlx::FromRow`) live next to the domain type they decode
//! into; repositories convert between the two.

pub mod review;
pub mod session;
pub mod store;
pub mod user;

pub use review::{NewReview, Review};
pub use session::CurrentUser;
pub use store::{Store, StoreCard, StoreDraft, StoreSummary, TopStore};
pub use user::{ResetTicket, User};
