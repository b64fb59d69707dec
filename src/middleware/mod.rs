//! Middleware components
//!
//! - Authentication (JWT)
//! - Rate limiting
//! - Security headers

pub mod auth;
pub mod rate_limit;
pub mod security_headers;

pub use auth::{auth_middleware, AuthUser, Claims};
pub use rate_limit::{
    api_rate_limit_config, auth_rate_limit_config, rate_limit_middleware,
    spawn_rate_limit_cleanup, RateLimitConfig, RateLimitState,
};
pub use security_headers::{api_cache_control_middleware, security_headers_middleware};
