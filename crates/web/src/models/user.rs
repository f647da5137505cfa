//! User domain types.

use chrono::{DateTime, Utc};

use delicious_core::{Email, UserId};

/// A registered user (domain type).
///
/// The password hash and reset token never leave the repository layer as
/// part of this type.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Display name shown on reviews.
    pub name: String,
    /// Login identifier.
    pub email: Email,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// The reset token a user currently holds and when it stops working.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ResetTicket {
    /// Owner of the token.
    pub user_id: UserId,
    /// Address the link was mailed to.
    pub email: Email,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}
