//! # Link Service
//!
//! Account-link backend: users bind their game ids and QQ number to their
//! account over HTTP; QQ numbers are checked against a verification group
//! through the OneBot gateway bridge.
//!
//! ## Modules
//!
//! - `config/` - JSON configuration with environment overrides
//! - `store/` - user records behind the `UserStore` port
//! - `captcha/` - Cloudflare Turnstile client behind `CaptchaVerifier`
//! - `routes/` - axum handlers and the response envelope
//! - `runtime/` - wiring of bus, bridge and router

pub mod captcha;
pub mod config;
pub mod routes;
pub mod runtime;
pub mod store;

pub use captcha::{CaptchaError, CaptchaOutcome, CaptchaVerifier, TurnstileClient};
pub use config::{ConfigError, ServiceConfig};
pub use routes::{router, ApiResponse, AppState};
pub use runtime::LinkRuntime;
pub use store::{InMemoryUserStore, StoreError, UserRecord, UserStore};
