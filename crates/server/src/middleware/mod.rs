//! HTTP middleware stack.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Rate limiting on credential endpoints (governor)
//!
//! Authentication is not a layer: handlers opt in with the [`RequireAuth`],
//! [`RequireRefresh`] and [`RequireAdmin`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{AuthRejection, RequireAdmin, RequireAuth, RequireRefresh};
pub use rate_limit::auth_rate_limiter;
pub use request_id::{RequestId, request_id_middleware};
