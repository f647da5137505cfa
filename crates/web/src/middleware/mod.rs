//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Security headers
//! 6. Rate limiting (governor), on credential routes only
//!
//! Extractors: [`RequireUser`] and [`PageContext`], which carries the
//! optional signed-in user for every page.

pub mod auth;
pub mod flash;
pub mod headers;
pub mod rate_limit;
pub mod session;

pub use auth::{RequireUser, clear_current_user, set_current_user};
pub use flash::{FlashLevel, FlashMessage, PageContext};
pub use headers::{request_id_middleware, security_headers_middleware};
pub use rate_limit::auth_rate_limiter;
pub use session::create_session_layer;
