//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → host_guard.rs (Host/Origin must be loopback or allow-listed)
//!     → admission.rs
//!         → rate_limit.rs (per-IP token bucket)
//!         → auth.rs (static bearer token, then OAuth introspection)
//!     → Pass to MCP handlers
//!
//! Health endpoint: host_guard.rs only.
//! ```
//!
//! # Design Decisions
//! - Defense in depth: multiple layers of protection
//! - Cheapest check first: host guard, then rate limit, then network-bound auth
//! - Misconfiguration is a 500, never silently a 401
//! - No configured credentials means open local mode, logged loudly

pub mod admission;
pub mod auth;
pub mod host_guard;
pub mod rate_limit;

pub use admission::{admission_middleware, Admission};
pub use auth::{AuthDecision, Authorizer, HybridAuthorizer};
pub use host_guard::{host_guard_middleware, HostGuard, HostGuardError};
pub use rate_limit::{RateLimiter, TokenBucketLimiter, Unlimited};
