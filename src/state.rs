use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::metrics::AUTH_REDIRECTS;
use crate::rate_limit::LimiterSet;
use crate::session::{
    EventBus, LOGIN_PATH, LogNavigator, MemoryStore, Navigator, SESSION_INDICATOR_KEYS,
    SessionStore, StorefrontEvent,
};

// Services shared by every call made through one client

pub struct ClientContext {
    pub store: Arc<dyn SessionStore>,
    pub events: EventBus,
    pub limiters: LimiterSet,
    pub navigator: Arc<dyn Navigator>,
    pub login_redirect_delay: Duration, // grace period before leaving the page
    redirect_pending: Arc<AtomicBool>,  // set from first 401 until the redirect fires
}

impl Default for ClientContext {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            events: EventBus::default(),
            limiters: LimiterSet::default(),
            navigator: Arc::new(LogNavigator),
            login_redirect_delay: Duration::from_millis(1500),
            redirect_pending: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn with_limiters(mut self, limiters: LimiterSet) -> Self {
        self.limiters = limiters;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_login_redirect_delay(mut self, delay: Duration) -> Self {
        self.login_redirect_delay = delay;
        self
    }

    pub fn redirect_pending(&self) -> bool {
        self.redirect_pending.load(Ordering::SeqCst)
    }

    /// Session loss: clear local indicators, announce it once and send the
    /// user to the login page after a short delay. Further 401s arriving
    /// before the redirect fires are absorbed. Returns whether this call
    /// started the redirect.
    pub fn handle_unauthorized(&self) -> bool {
        if self
            .redirect_pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        for key in SESSION_INDICATOR_KEYS {
            self.store.remove(key);
        }
        self.events.publish(StorefrontEvent::auth_changed(false));
        AUTH_REDIRECTS.inc();
        info!(delay_ms = self.login_redirect_delay.as_millis() as u64, "session expired, redirecting to login");

        let navigator = Arc::clone(&self.navigator);
        let pending = Arc::clone(&self.redirect_pending);
        let delay = self.login_redirect_delay;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    navigator.redirect(LOGIN_PATH);
                    pending.store(false, Ordering::SeqCst);
                });
            }
            Err(_) => {
                warn!("no async runtime, redirecting immediately");
                navigator.redirect(LOGIN_PATH);
                pending.store(false, Ordering::SeqCst);
            }
        }
        true
    }
}
