//! Maps backend HTTP statuses to user-facing messages and recovery actions.
//!
//! Everything here is pure: no I/O, no clock, no shared state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Backoff hint (seconds) handed out for a server-side 429 without `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// What the caller should do about a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Logout,
    RedirectHome,
    Retry,
    RetryDelay,
    ShowMaintenance,
    ShowError,
}

impl RecoveryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::RedirectHome => "redirect_home",
            Self::Retry => "retry",
            Self::RetryDelay => "retry_delay",
            Self::ShowMaintenance => "show_maintenance",
            Self::ShowError => "show_error",
        }
    }
}

/// Error taxonomy shared by every failure that leaves the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    RateLimited,
    Server,
    Timeout,
    Network,
    Unknown,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 409 | 422 => Self::Validation,
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            429 => Self::RateLimited,
            500 | 502 | 503 | 504 => Self::Server,
            _ => Self::Unknown,
        }
    }
}

/// Error body as returned by the backend. All fields optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub errors: Option<FieldErrors>,
}

impl ErrorPayload {
    // `message` wins over `error`; blank strings count as absent
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or(self.error.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Field-level validation detail, in either of the shapes the backend emits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldErrors {
    List(Vec<FieldError>),
    Map(BTreeMap<String, FieldMessages>),
    // Any other shape; kept so the rest of the payload still parses
    Other(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldError {
    #[serde(alias = "path", alias = "param")]
    pub field: String,
    #[serde(alias = "msg")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldMessages {
    One(String),
    Many(Vec<String>),
}

impl FieldErrors {
    // Flatten into field -> first message
    pub fn collect(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        match self {
            Self::List(items) => {
                for item in items {
                    out.entry(item.field.clone())
                        .or_insert_with(|| item.message.clone());
                }
            }
            Self::Map(map) => {
                for (field, messages) in map {
                    let first = match messages {
                        FieldMessages::One(m) => Some(m.clone()),
                        FieldMessages::Many(ms) => ms.first().cloned(),
                    };
                    if let Some(message) = first {
                        out.insert(field.clone(), message);
                    }
                }
            }
            Self::Other(_) => {}
        }
        out
    }
}

/// Result of translating a status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub message: String,
    pub action: RecoveryAction,
    pub is_validation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, String>,
}

impl Translation {
    fn new(message: impl Into<String>, action: RecoveryAction) -> Self {
        Self {
            message: message.into(),
            action,
            is_validation: false,
            retry_after: None,
            field_errors: BTreeMap::new(),
        }
    }

    fn validation(mut self) -> Self {
        self.is_validation = true;
        self
    }
}

pub fn translate(status: u16, payload: Option<&ErrorPayload>) -> Translation {
    let backend_text = payload.and_then(ErrorPayload::text);
    let or_backend = |fallback: &str| backend_text.unwrap_or(fallback).to_string();

    match status {
        400 => Translation::new(
            or_backend("Invalid request. Please check your input."),
            RecoveryAction::ShowError,
        )
        .validation(),
        401 => Translation::new(
            "Your session has expired. Please log in again.",
            RecoveryAction::Logout,
        ),
        403 => Translation::new(
            "You do not have permission to perform this action.",
            RecoveryAction::RedirectHome,
        ),
        404 => Translation::new(
            "The requested resource was not found.",
            RecoveryAction::ShowError,
        ),
        409 => Translation::new(
            or_backend("This request conflicts with the current state. Please refresh and try again."),
            RecoveryAction::ShowError,
        )
        .validation(),
        422 => {
            let mut t = Translation::new(
                or_backend("Please correct the highlighted fields."),
                RecoveryAction::ShowError,
            )
            .validation();
            if let Some(errors) = payload.and_then(|p| p.errors.as_ref()) {
                t.field_errors = errors.collect();
            }
            t
        }
        429 => {
            let mut t = Translation::new(
                "Too many requests. Please wait a moment and try again.",
                RecoveryAction::RetryDelay,
            );
            t.retry_after = Some(DEFAULT_RETRY_AFTER_SECS);
            t
        }
        500 => Translation::new(
            "Something went wrong on our end. Please try again later.",
            RecoveryAction::ShowError,
        ),
        502 => Translation::new(
            "The service is temporarily unreachable. Please try again.",
            RecoveryAction::Retry,
        ),
        503 => Translation::new(
            "The store is undergoing maintenance. Please check back shortly.",
            RecoveryAction::ShowMaintenance,
        ),
        504 => Translation::new(
            "The server took too long to respond. Please try again.",
            RecoveryAction::Retry,
        ),
        _ => Translation::new(
            "An unexpected error occurred. Please try again.",
            RecoveryAction::ShowError,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> ErrorPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_not_found_ignores_payload() {
        let a = translate(404, None);
        let b = translate(404, Some(&payload(r#"{"message":"no such product"}"#)));
        assert_eq!(a, b);
        assert_eq!(a.action, RecoveryAction::ShowError);
        assert!(!a.is_validation);
    }

    #[test]
    fn test_unknown_status_falls_back() {
        let t = translate(418, Some(&payload(r#"{"message":"teapot"}"#)));
        assert_eq!(t.message, "An unexpected error occurred. Please try again.");
        assert_eq!(t.action, RecoveryAction::ShowError);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Unknown);
    }

    #[test]
    fn test_action_table() {
        let cases = [
            (400, RecoveryAction::ShowError),
            (401, RecoveryAction::Logout),
            (403, RecoveryAction::RedirectHome),
            (409, RecoveryAction::ShowError),
            (429, RecoveryAction::RetryDelay),
            (500, RecoveryAction::ShowError),
            (502, RecoveryAction::Retry),
            (503, RecoveryAction::ShowMaintenance),
            (504, RecoveryAction::Retry),
        ];
        for (status, action) in cases {
            assert_eq!(translate(status, None).action, action, "status {status}");
        }
    }

    #[test]
    fn test_validation_passes_backend_message_and_fields() {
        let p = payload(
            r#"{"message":"Invalid address","errors":[
                {"field":"zip","message":"ZIP code is required"},
                {"field":"zip","message":"ignored second"},
                {"path":"city","msg":"City is too long"}
            ]}"#,
        );
        let t = translate(422, Some(&p));
        assert_eq!(t.message, "Invalid address");
        assert!(t.is_validation);
        assert_eq!(t.field_errors["zip"], "ZIP code is required");
        assert_eq!(t.field_errors["city"], "City is too long");
    }

    #[test]
    fn test_field_errors_map_shape() {
        let p = payload(r#"{"error":"bad","errors":{"email":["taken","invalid"],"name":"required"}}"#);
        let t = translate(422, Some(&p));
        assert_eq!(t.message, "bad");
        assert_eq!(t.field_errors["email"], "taken");
        assert_eq!(t.field_errors["name"], "required");
    }

    #[test]
    fn test_unexpected_errors_shape_keeps_message() {
        let p = payload(r#"{"message":"Coupon expired","errors":"coupon invalid"}"#);
        assert!(matches!(p.errors, Some(FieldErrors::Other(_))));

        let t = translate(422, Some(&p));
        assert_eq!(t.message, "Coupon expired");
        assert!(t.field_errors.is_empty());
    }

    #[test]
    fn test_rate_limit_carries_backoff_hint() {
        let t = translate(429, None);
        assert_eq!(t.retry_after, Some(DEFAULT_RETRY_AFTER_SECS));
    }

    #[test]
    fn test_blank_backend_message_uses_default() {
        let t = translate(400, Some(&payload(r#"{"message":"   "}"#)));
        assert_eq!(t.message, "Invalid request. Please check your input.");
    }

    #[test]
    fn test_recovery_action_serializes_snake_case() {
        let json = serde_json::to_string(&RecoveryAction::ShowMaintenance).unwrap();
        assert_eq!(json, "\"show_maintenance\"");
        assert_eq!(RecoveryAction::RedirectHome.as_str(), "redirect_home");
    }
}
