//! Flash messages: one-shot notices carried across a redirect.
//!
//! Handlers push messages into the session before redirecting; the next
//! page that renders takes (and so clears) them.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::middleware::auth::current_user;
use crate::models::CurrentUser;
use crate::models::session::keys;

/// Severity of a flash message; doubles as its CSS modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A queued message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

/// Queue a message for the next rendered page.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push(
    session: &Session,
    level: FlashLevel,
    message: impl Into<String>,
) -> Result<(), tower_sessions::session::Error> {
    let mut queued: Vec<FlashMessage> = session.get(keys::FLASH).await?.unwrap_or_default();
    queued.push(FlashMessage {
        level,
        message: message.into(),
    });
    session.insert(keys::FLASH, queued).await
}

/// Queue several messages at the same level.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn push_all(
    session: &Session,
    level: FlashLevel,
    messages: Vec<String>,
) -> Result<(), tower_sessions::session::Error> {
    for message in messages {
        push(session, level, message).await?;
    }
    Ok(())
}

/// Remove and return every queued message.
///
/// The session is only touched when something is queued, so pages viewed
/// without flashes never force a session write.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn take(session: &Session) -> Result<Vec<FlashMessage>, tower_sessions::session::Error> {
    let queued: Option<Vec<FlashMessage>> = session.get(keys::FLASH).await?;
    match queued {
        Some(queued) => {
            session.remove::<Vec<FlashMessage>>(keys::FLASH).await?;
            Ok(queued)
        }
        None => Ok(Vec::new()),
    }
}

/// What every page template needs: the signed-in user and the flashes to
/// show.
///
/// Extracting this drains the flash queue, so take it only in handlers
/// that render HTML.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub user: Option<CurrentUser>,
    pub flashes: Vec<FlashMessage>,
}

impl PageContext {
    #[must_use]
    pub const fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Read the signed-in user and drain the flash queue.
    ///
    /// Handlers that may redirect instead of rendering call this only once
    /// they know they will render, so queued flashes survive the redirect.
    pub async fn from_session(session: &Session) -> Self {
        let user = current_user(session).await;
        let flashes = match take(session).await {
            Ok(flashes) => flashes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read flash messages");
                Vec::new()
            }
        };

        Self { user, flashes }
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<Session>() {
            Some(session) => Ok(Self::from_session(session).await),
            None => Ok(Self::default()),
        }
    }
}
