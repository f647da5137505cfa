//! Database tests for accounts and the password reset flow.
//!
//! These tests require a disposable `PostgreSQL` database in
//! `TEST_DATABASE_URL`; every table is truncated before each test.
//!
//! Run with: cargo test -p delicious-integration-tests -- --ignored

use chrono::{DateTime, TimeDelta, Utc};

use delicious_integration_tests::{TEST_PASSWORD, TestDb};
use delicious_web::services::auth::{AuthError, AuthService, PasswordResetService};
use delicious_web::services::email::EmailService;

const BASE_URL: &str = "http://localhost:7777";

async fn pending_token(db: &TestDb, email: &str) -> Option<(String, DateTime<Utc>)> {
    let row: (Option<String>, Option<DateTime<Utc>>) = sqlx::query_as(
        "SELECT reset_password_token, reset_password_expires FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_one(&db.pool)
    .await
    .expect("user row");
    row.0.zip(row.1)
}

// ============================================================================
// Registration & Login
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_register_then_login_with_any_email_case() {
    let db = TestDb::new().await;
    let auth = AuthService::new(&db.pool);

    let user = auth
        .register_with_password("Wes", " Wes@Example.COM ", TEST_PASSWORD, TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(user.email.as_str(), "wes@example.com");

    let signed_in = auth
        .login_with_password("WES@example.com", TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(signed_in.id, user.id);

    let err = auth
        .login_with_password("wes@example.com", "wrong-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials), "{err:?}");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_register_rejects_taken_email() {
    let db = TestDb::new().await;
    db.user("Wes").await;

    let err = AuthService::new(&db.pool)
        .register_with_password("Other Wes", "wes@example.com", TEST_PASSWORD, TEST_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::UserAlreadyExists), "{err:?}");
}

// ============================================================================
// Password Reset
// ============================================================================

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_reset_flow_consumes_token() {
    let db = TestDb::new().await;
    let wes = db.user("Wes").await;
    let email = EmailService::log_only();
    let resets = PasswordResetService::new(&db.pool, &email, BASE_URL);
    let now = Utc::now();

    resets.request("wes@example.com", now).await.unwrap();
    let (token, expires) = pending_token(&db, "wes@example.com").await.unwrap();
    assert_eq!(token.len(), 40);
    // Stored with microsecond precision.
    let drift = expires - now - TimeDelta::seconds(3600);
    assert!(drift.num_milliseconds().abs() < 1, "{drift}");

    let ticket = resets.lookup(&token, now).await.unwrap();
    assert_eq!(ticket.user_id, wes.id);

    // A mismatch leaves the reset pending.
    let err = resets
        .confirm(&token, "new-password-1", "new-password-2", now)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordMismatch), "{err:?}");
    assert!(pending_token(&db, "wes@example.com").await.is_some());

    let user = resets
        .confirm(&token, "new-password-1", "new-password-1", now)
        .await
        .unwrap();
    assert_eq!(user.id, wes.id);
    assert!(pending_token(&db, "wes@example.com").await.is_none());

    let err = resets.lookup(&token, now).await.unwrap_err();
    assert!(matches!(err, AuthError::ResetTokenInvalid), "{err:?}");

    let auth = AuthService::new(&db.pool);
    assert!(auth.login_with_password("wes@example.com", "new-password-1").await.is_ok());
    assert!(auth.login_with_password("wes@example.com", TEST_PASSWORD).await.is_err());
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_reset_token_expires_after_an_hour() {
    let db = TestDb::new().await;
    db.user("Wes").await;
    let email = EmailService::log_only();
    let resets = PasswordResetService::new(&db.pool, &email, BASE_URL);
    let requested = Utc::now();

    resets.request("wes@example.com", requested).await.unwrap();
    let (token, expires) = pending_token(&db, "wes@example.com").await.unwrap();

    assert!(resets.lookup(&token, expires - TimeDelta::seconds(1)).await.is_ok());

    let err = resets.lookup(&token, expires).await.unwrap_err();
    assert!(matches!(err, AuthError::ResetTokenInvalid), "{err:?}");

    let err = resets
        .confirm(&token, "new-password-1", "new-password-1", expires + TimeDelta::minutes(5))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::ResetTokenInvalid), "{err:?}");
}

#[tokio::test]
#[ignore = "Requires TEST_DATABASE_URL"]
async fn test_reset_request_for_unknown_email_succeeds_silently() {
    let db = TestDb::new().await;
    let email = EmailService::log_only();
    let resets = PasswordResetService::new(&db.pool, &email, BASE_URL);

    assert!(resets.request("nobody@example.com", Utc::now()).await.is_ok());
    assert!(resets.request("not an email", Utc::now()).await.is_ok());
}
