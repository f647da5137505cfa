//! Account route handlers: profile edits and password resets.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{FlashLevel, PageContext, RequireUser, set_current_user};
use crate::models::CurrentUser;
use crate::routes::auth::sign_in;
use crate::routes::{flash_errors, redirect_with_flash};
use crate::services::auth::{AuthError, AuthService, PasswordResetService};
use crate::state::AppState;

/// Shown after every reset request, whether or not the account exists.
pub const RESET_REQUESTED: &str = "If an account exists for that email, a reset link has been sent.";

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct AccountForm {
    pub name: String,
    pub email: String,
}

/// Forgot password form data.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// Reset password form data.
#[derive(Debug, Deserialize)]
pub struct ResetPasswordForm {
    pub password: String,
    #[serde(rename = "password-confirm")]
    pub password_confirm: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Account page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/index.html")]
pub struct AccountTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub user: CurrentUser,
}

/// Reset password page template.
#[derive(Template, WebTemplate)]
#[template(path = "account/reset.html")]
pub struct ResetPasswordTemplate {
    pub ctx: PageContext,
    pub title: String,
    pub action: String,
}

fn reset_path(token: &str) -> String {
    format!("/account/reset/{}", urlencoding::encode(token))
}

// =============================================================================
// Profile
// =============================================================================

/// Display the profile form.
pub async fn index(RequireUser(user): RequireUser, ctx: PageContext) -> impl IntoResponse {
    AccountTemplate {
        ctx,
        title: "Edit Your Account".to_owned(),
        user,
    }
}

/// Update name and email.
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    session: Session,
    Form(form): Form<AccountForm>,
) -> Result<Response> {
    match AuthService::new(state.pool())
        .update_profile(user.id, &form.name, &form.email)
        .await
    {
        Ok(updated) => {
            set_current_user(&session, &CurrentUser::from(&updated)).await?;
            redirect_with_flash(&session, FlashLevel::Success, "Updated the profile!", "/account")
                .await
        }
        Err(e) => flash_errors(&session, e.into(), "/account").await,
    }
}

// =============================================================================
// Password Reset
// =============================================================================

/// Email a reset link if the account exists.
pub async fn forgot(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ForgotPasswordForm>,
) -> Result<Response> {
    PasswordResetService::new(state.pool(), state.email(), &state.config().base_url)
        .request(&form.email, Utc::now())
        .await?;

    redirect_with_flash(&session, FlashLevel::Info, RESET_REQUESTED, "/login").await
}

/// Display the reset form for a live token.
pub async fn reset_page(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Result<Response> {
    let service = PasswordResetService::new(state.pool(), state.email(), &state.config().base_url);

    match service.lookup(&token, Utc::now()).await {
        Ok(_) => Ok(ResetPasswordTemplate {
            ctx: PageContext::from_session(&session).await,
            title: "Reset your Password".to_owned(),
            action: reset_path(&token),
        }
        .into_response()),
        Err(e @ AuthError::ResetTokenInvalid) => flash_errors(&session, e.into(), "/login").await,
        Err(e) => Err(e.into()),
    }
}

/// Set a new password and sign the user in.
///
/// A password mismatch goes back to the form with the token still pending;
/// an unknown or expired token goes to the login page.
pub async fn reset(
    State(state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<ResetPasswordForm>,
) -> Result<Response> {
    let service = PasswordResetService::new(state.pool(), state.email(), &state.config().base_url);

    match service
        .confirm(&token, &form.password, &form.password_confirm, Utc::now())
        .await
    {
        Ok(user) => {
            sign_in(&session, &user).await?;
            redirect_with_flash(
                &session,
                FlashLevel::Success,
                "Nice! Your password has been reset! You are now logged in!",
                "/",
            )
            .await
        }
        Err(e @ AuthError::ResetTokenInvalid) => flash_errors(&session, e.into(), "/login").await,
        Err(e @ (AuthError::PasswordMismatch | AuthError::WeakPassword(_))) => {
            flash_errors(&session, AppError::from(e), &reset_path(&token)).await
        }
        Err(e) => Err(e.into()),
    }
}
