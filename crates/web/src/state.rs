//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::services::email::EmailService;
use crate::services::uploads::PhotoUploader;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    email: EmailService,
    uploader: PhotoUploader,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP relay in the configuration is invalid.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, lettre::transport::smtp::Error> {
        let email = EmailService::new(config.email.as_ref())?;
        let uploader = PhotoUploader::new(config.upload_dir.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                email,
                uploader,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the email service.
    #[must_use]
    pub fn email(&self) -> &EmailService {
        &self.inner.email
    }

    /// Get a reference to the photo uploader.
    #[must_use]
    pub fn uploader(&self) -> &PhotoUploader {
        &self.inner.uploader
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;
    use std::time::Duration;

    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower_sessions::cookie::Key;

    use super::AppState;
    use crate::config::AppConfig;

    /// State backed by a pool that never connects until a query runs.
    ///
    /// Must be called inside a Tokio runtime.
    #[allow(clippy::unwrap_used)]
    pub fn lazy_state() -> AppState {
        let config = AppConfig {
            database_url: SecretString::from("postgres://delicious@localhost:1/delicious_test"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            base_url: "http://localhost:7777".to_owned(),
            session_key: Key::from(&[7; 64]),
            trust_proxy: false,
            upload_dir: PathBuf::from("target/test-uploads"),
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 0.0,
            sentry_traces_sample_rate: 0.0,
        };
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_secs(1))
            .connect_lazy("postgres://delicious@localhost:1/delicious_test")
            .unwrap();
        AppState::new(config, pool).unwrap()
    }
}
