//! Authentication module for the board server
//!
//! Token issuance and validation, logout-all revocation, the per-request
//! authentication gate and the content mutation rate limiter.

pub mod gate;
pub mod handlers;
pub mod password;
pub mod rate_limit;
pub mod revocation;
pub mod service;
pub mod token;

pub use gate::{AuthState, AuthenticationGate, Principal};
pub use rate_limit::{MutationGuard, MutationKind, RateLimitConfig, RateLimiter};
pub use revocation::RevocationGate;
pub use service::AuthService;
pub use token::{Claims, TokenCodec};
