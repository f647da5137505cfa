//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::email::EmailError;
use crate::services::uploads::UploadError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Photo upload was rejected or could not be stored.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Outgoing mail failed.
    #[error("Email error: {0}")]
    Email(#[from] EmailError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Form input failed validation; one message per problem.
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The user may not touch this resource.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write lost a race with another write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Whether this error should be reported to Sentry.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Database(_) | Self::Email(_) | Self::Session(_) => true,
            Self::Upload(err) => !err.is_client_error(),
            Self::Auth(err) => matches!(err, AuthError::Repository(_) | AuthError::PasswordHash),
            _ => false,
        }
    }

    /// Messages suitable for flashing back to the user, if this is an
    /// error the user can fix by resubmitting.
    #[must_use]
    pub fn user_messages(&self) -> Option<Vec<String>> {
        match self {
            Self::Validation(messages) => Some(messages.clone()),
            Self::Upload(err) if err.is_client_error() => Some(vec![err.to_string()]),
            Self::Conflict(msg) | Self::Forbidden(msg) => Some(vec![msg.clone()]),
            Self::Auth(err) => auth_message(err).map(|m| vec![m]),
            _ => None,
        }
    }
}

fn auth_message(err: &AuthError) -> Option<String> {
    let message = match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => "Failed Login!".to_owned(),
        AuthError::UserAlreadyExists => "An account with this email already exists".to_owned(),
        AuthError::InvalidEmail(_) => "That Email is not valid!".to_owned(),
        AuthError::MissingName => "You must supply a name!".to_owned(),
        AuthError::WeakPassword(msg) => msg.clone(),
        AuthError::PasswordMismatch => "Passwords do not match!".to_owned(),
        AuthError::ResetTokenInvalid => "Password reset is invalid or has expired".to_owned(),
        AuthError::Repository(_) | AuthError::PasswordHash => return None,
    };
    Some(message)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Email(_) => StatusCode::BAD_GATEWAY,
            Self::Upload(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::MissingName
                | AuthError::PasswordMismatch
                | AuthError::ResetTokenInvalid => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
        };

        // Don't expose internal error details to clients
        let message = if status == StatusCode::NOT_FOUND {
            "Not found".to_string()
        } else if status.is_server_error() {
            match &self {
                Self::Email(_) => "External service error".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            match &self {
                Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
                _ => self
                    .user_messages()
                    .map_or_else(|| self.to_string(), |m| m.join("\n")),
            }
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
