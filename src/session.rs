//! Injected replacements for browser globals: key/value session storage,
//! a pub/sub event bus and page navigation.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub const USER_KEY: &str = "user";
pub const CSRF_TOKEN_KEY: &str = "csrf_token";
pub const LOGIN_PATH: &str = "/login";

// Keys wiped when the backend says the session is gone
pub const SESSION_INDICATOR_KEYS: [&str; 2] = [USER_KEY, CSRF_TOKEN_KEY];

/// Client-visible session storage (never holds the httpOnly auth cookie).
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// Something that can move the user to another page.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

// Headless default: just records the intent in the log
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn redirect(&self, path: &str) {
        info!(path, "redirect requested");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorefrontEvent {
    AuthChanged {
        authenticated: bool,
        at: DateTime<Utc>,
    },
    CartChanged {
        at: DateTime<Utc>,
    },
}

impl StorefrontEvent {
    pub fn auth_changed(authenticated: bool) -> Self {
        Self::AuthChanged {
            authenticated,
            at: Utc::now(),
        }
    }

    pub fn cart_changed() -> Self {
        Self::CartChanged { at: Utc::now() }
    }
}

/// Explicit pub/sub channel for cross-component notifications.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StorefrontEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    // Returns how many subscribers saw the event
    pub fn publish(&self, event: StorefrontEvent) -> usize {
        debug!(?event, "publishing event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorefrontEvent> {
        self.tx.subscribe()
    }
}
