//! The single error type every client call fails with.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::translate::{ErrorKind, ErrorPayload, RecoveryAction, translate};

/// Statuses worth retrying: rate limiting and transient upstream failures.
pub const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Normalized client error. Callers branch on `kind`/`action`, never on
/// transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub action: RecoveryAction,
    pub is_validation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
    // Set only for client-side limiter rejections; never sent to the network
    #[serde(skip_serializing_if = "is_false")]
    pub client_side: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ApiError {
    /// Error for a non-success HTTP response.
    pub fn from_status(status: u16, payload: Option<&ErrorPayload>) -> Self {
        let t = translate(status, payload);
        Self {
            kind: ErrorKind::from_status(status),
            message: t.message,
            status_code: Some(status),
            action: t.action,
            is_validation: t.is_validation,
            retry_after: t.retry_after,
            field_errors: t.field_errors,
            client_side: false,
        }
    }

    /// Rejection from the client-side limiter; shaped like a server 429.
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            message: format!(
                "Too many requests. Please try again in {} seconds.",
                retry_after_secs
            ),
            status_code: Some(429),
            action: RecoveryAction::RetryDelay,
            is_validation: false,
            retry_after: Some(retry_after_secs),
            field_errors: BTreeMap::new(),
            client_side: true,
        }
    }

    pub fn timeout() -> Self {
        Self::transport(
            ErrorKind::Timeout,
            "Request timed out. Please check your connection and try again.",
        )
    }

    pub fn network(detail: impl std::fmt::Display) -> Self {
        tracing::debug!(error = %detail, "network failure");
        Self::transport(
            ErrorKind::Network,
            "Network error. Please check your internet connection.",
        )
    }

    // Response arrived but could not be understood
    pub fn invalid_response(detail: impl std::fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: format!("Unexpected response from server: {}", detail),
            status_code: None,
            action: RecoveryAction::ShowError,
            is_validation: false,
            retry_after: None,
            field_errors: BTreeMap::new(),
            client_side: false,
        }
    }

    // Request could not be built locally (body encoding, bad path segment)
    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::local(format!("Could not encode request: {}", detail))
    }

    pub fn client_setup(detail: impl std::fmt::Display) -> Self {
        Self::local(format!("Failed to create HTTP client: {}", detail))
    }

    pub fn invalid_url(url: &str, detail: impl std::fmt::Display) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: format!("Invalid request URL {}: {}", url, detail),
            status_code: None,
            action: RecoveryAction::ShowError,
            is_validation: false,
            retry_after: None,
            field_errors: BTreeMap::new(),
            client_side: false,
        }
    }

    fn local(message: String) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message,
            status_code: None,
            action: RecoveryAction::ShowError,
            is_validation: false,
            retry_after: None,
            field_errors: BTreeMap::new(),
            client_side: false,
        }
    }

    fn transport(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_string(),
            status_code: None,
            action: RecoveryAction::Retry,
            is_validation: false,
            retry_after: None,
            field_errors: BTreeMap::new(),
            client_side: false,
        }
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }

    /// Transient server-side failure. A local limiter rejection never is:
    /// repeating it only burns more of the quota.
    pub fn is_retryable(&self) -> bool {
        !self.client_side
            && self
                .status_code
                .is_some_and(|s| RETRYABLE_STATUSES.contains(&s))
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code == Some(401)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
