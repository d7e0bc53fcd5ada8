//! Typed request layer for the storefront backend API.
//!
//! - [`ApiClient`]: timeout/abort, CSRF header, cookies, client-side rate
//!   limiting and error translation around every call
//! - [`SlidingWindowLimiter`]: advisory per-key quotas (general, auth, payment)
//! - [`translate`]: pure status-code to message/recovery-action mapping
//! - [`retry_with_backoff`]: caller-driven retries for transient statuses
//! - [`generate_idempotency_key`]: per-checkout keys for `POST /orders`
//!
//! Session storage, event notification and navigation are injected through
//! [`ClientContext`] so nothing depends on process-wide state.

mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod metrics;
pub mod models;
pub mod rate_limit;
pub mod retry;
pub mod session;
pub mod state;
pub mod translate;

pub use client::{ApiClient, CSRF_HEADER, RequestOptions, path_segment};
pub use config::ClientConfig;
pub use error::{ApiError, ApiResult};
pub use idempotency::{IDEMPOTENCY_HEADER, generate_idempotency_key};
pub use rate_limit::{EndpointClass, LimiterSet, RateLimitPolicy, RateLimited, SlidingWindowLimiter};
pub use retry::{RetryPolicy, retry_with_backoff};
pub use session::{EventBus, LogNavigator, MemoryStore, Navigator, SessionStore, StorefrontEvent};
pub use state::ClientContext;
pub use translate::{ErrorKind, ErrorPayload, RecoveryAction, Translation, translate};
