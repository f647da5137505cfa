//! Password reset flow.
//!
//! An account moves `Idle -> Pending` when a reset is requested (a token
//! and expiry are stored on the user row) and back to `Idle` when the new
//! password is confirmed, which clears both columns in the same statement.
//! A token whose expiry has passed is treated like a missing one.

use chrono::{DateTime, TimeDelta, Utc};
use sqlx::PgPool;

use delicious_core::Email;

use super::{AuthError, check_new_password, hash_password};
use crate::db::users::UserRepository;
use crate::models::{ResetTicket, User};
use crate::services::email::EmailService;

/// Random bytes in a reset token (40 hex characters).
const TOKEN_BYTES: usize = 20;

/// Seconds a reset token stays valid.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// A freshly generated reset token and its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Generate a token that expires [`TOKEN_LIFETIME_SECS`] after `now`.
    #[must_use]
    pub fn generate(now: DateTime<Utc>) -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        Self {
            value: hex::encode(bytes),
            expires_at: now + TimeDelta::seconds(TOKEN_LIFETIME_SECS),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// A token is usable strictly before its expiry.
    #[must_use]
    pub fn is_valid_at(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        expires_at > now
    }

    /// `{base_url}/account/reset/{token}`.
    #[must_use]
    pub fn reset_url(&self, base_url: &str) -> String {
        format!("{}/account/reset/{}", base_url.trim_end_matches('/'), self.value)
    }
}

/// Requests, checks and confirms password resets.
pub struct PasswordResetService<'a> {
    users: UserRepository<'a>,
    email: &'a EmailService,
    base_url: &'a str,
}

impl<'a> PasswordResetService<'a> {
    /// Create a new password reset service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService, base_url: &'a str) -> Self {
        Self {
            users: UserRepository::new(pool),
            email,
            base_url,
        }
    }

    /// Start a reset for the account with `email`, if there is one.
    ///
    /// Succeeds the same way whether or not the account exists, and when
    /// the address does not parse, so the response cannot be used to probe
    /// for registered emails. Mail delivery failures are logged and
    /// reported to Sentry.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the token cannot be stored.
    pub async fn request(&self, email: &str, now: DateTime<Utc>) -> Result<(), AuthError> {
        let Ok(email) = Email::parse(email) else {
            tracing::debug!("Password reset requested for an unparseable email");
            return Ok(());
        };

        let token = ResetToken::generate(now);
        let Some(user) = self
            .users
            .set_reset_token(&email, token.as_str(), token.expires_at())
            .await?
        else {
            tracing::debug!("Password reset requested for an unknown email");
            return Ok(());
        };

        let reset_url = token.reset_url(self.base_url);
        if let Err(e) = self
            .email
            .send_password_reset(user.email.as_str(), &user.name, &reset_url)
            .await
        {
            let event_id = sentry::capture_error(&e);
            tracing::error!(error = %e, user_id = %user.id, sentry_event_id = %event_id, "Failed to send password reset email");
        } else {
            tracing::info!(user_id = %user.id, "Password reset requested");
        }

        Ok(())
    }

    /// Find the pending reset for `token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::ResetTokenInvalid` if the token is unknown or expired.
    pub async fn lookup(&self, token: &str, now: DateTime<Utc>) -> Result<ResetTicket, AuthError> {
        let ticket = self
            .users
            .find_by_reset_token(token, now)
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        if ResetToken::is_valid_at(ticket.expires_at, now) {
            Ok(ticket)
        } else {
            Err(AuthError::ResetTokenInvalid)
        }
    }

    /// Set a new password using `token`, consuming it.
    ///
    /// The passwords are checked before the token is touched, so a mismatch
    /// leaves the reset pending.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::PasswordMismatch` or `AuthError::WeakPassword` for bad input.
    /// Returns `AuthError::ResetTokenInvalid` if the token is unknown, expired,
    /// or was consumed concurrently.
    pub async fn confirm(
        &self,
        token: &str,
        password: &str,
        password_confirm: &str,
        now: DateTime<Utc>,
    ) -> Result<User, AuthError> {
        check_new_password(password, password_confirm)?;

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .reset_password(token, now, &password_hash)
            .await?
            .ok_or(AuthError::ResetTokenInvalid)?;

        tracing::info!(user_id = %user.id, "Password reset completed");
        Ok(user)
    }
}
