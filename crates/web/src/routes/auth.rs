//! Authentication route handlers.
//!
//! Handles login, registration and logout with locally stored Argon2
//! password hashes.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{FlashLevel, PageContext, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::routes::{flash_errors, redirect_with_flash};
use crate::services::auth::AuthService;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "password-confirm")]
    pub password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub ctx: PageContext,
    pub title: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub ctx: PageContext,
    pub title: String,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(ctx: PageContext) -> impl IntoResponse {
    LoginTemplate {
        ctx,
        title: "Login".to_owned(),
    }
}

/// Handle login form submission.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .login_with_password(&form.email, &form.password)
        .await
    {
        Ok(user) => {
            sign_in(&session, &user).await?;
            redirect_with_flash(&session, FlashLevel::Success, "You are now logged in!", "/").await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            flash_errors(&session, e.into(), "/login").await
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(ctx: PageContext) -> impl IntoResponse {
    RegisterTemplate {
        ctx,
        title: "Register".to_owned(),
    }
}

/// Handle registration form submission; the new user is signed in.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .register_with_password(&form.name, &form.email, &form.password, &form.password_confirm)
        .await
    {
        Ok(user) => {
            sign_in(&session, &user).await?;
            redirect_with_flash(&session, FlashLevel::Success, "You are now logged in!", "/").await
        }
        Err(e) => flash_errors(&session, e.into(), "/register").await,
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Sign out and go home.
pub async fn logout(session: Session) -> Result<Response> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    redirect_with_flash(&session, FlashLevel::Success, "You are now logged out!", "/").await
}

/// Put `user` in the session and tag Sentry events with them.
pub(crate) async fn sign_in(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}
