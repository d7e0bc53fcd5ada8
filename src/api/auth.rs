use serde_json::json;
use tracing::{debug, warn};

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{AuthResponse, Credentials, CsrfToken, MessageResponse, Registration, User};
use crate::session::{CSRF_TOKEN_KEY, SESSION_INDICATOR_KEYS, StorefrontEvent, USER_KEY};

impl ApiClient {
    pub async fn login(&self, credentials: &Credentials) -> ApiResult<AuthResponse> {
        let response: AuthResponse = self.post("/auth/login", credentials).await?;
        self.remember_session(&response);
        Ok(response)
    }

    pub async fn register(&self, registration: &Registration) -> ApiResult<AuthResponse> {
        let response: AuthResponse = self.post("/auth/register", registration).await?;
        self.remember_session(&response);
        Ok(response)
    }

    /// Ends the session. Local indicators are cleared even if the backend
    /// call fails, since the auth cookie may already be gone.
    pub async fn logout(&self) -> ApiResult<()> {
        let result: ApiResult<serde_json::Value> = self.post("/auth/logout", &json!({})).await;

        for key in SESSION_INDICATOR_KEYS {
            self.store().remove(key);
        }
        self.events().publish(StorefrontEvent::auth_changed(false));

        if let Err(e) = &result {
            warn!(error = %e, "logout request failed, local session cleared anyway");
        }
        result.map(|_| ())
    }

    pub async fn current_user(&self) -> ApiResult<User> {
        self.get("/auth/me").await
    }

    // Fetches a token and keeps it for the next state-changing calls
    pub async fn fetch_csrf_token(&self) -> ApiResult<String> {
        let token: CsrfToken = self.get("/auth/csrf-token").await?;
        self.store().set(CSRF_TOKEN_KEY, token.csrf_token.clone());
        debug!("csrf token refreshed");
        Ok(token.csrf_token)
    }

    pub async fn forgot_password(&self, email: &str) -> ApiResult<MessageResponse> {
        self.post("/auth/forgot-password", &json!({ "email": email }))
            .await
    }

    pub fn is_logged_in(&self) -> bool {
        self.store().get(USER_KEY).is_some()
    }

    fn remember_session(&self, response: &AuthResponse) {
        if let Some(user) = &response.user {
            match serde_json::to_string(user) {
                Ok(json) => self.store().set(USER_KEY, json),
                Err(e) => warn!(error = %e, "could not store user indicator"),
            }
        }
        if let Some(token) = &response.csrf_token {
            self.store().set(CSRF_TOKEN_KEY, token.clone());
        }
        self.events().publish(StorefrontEvent::auth_changed(true));
    }
}
