use tracing::warn;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{Address, ProfileUpdate, User};
use crate::session::USER_KEY;

impl ApiClient {
    pub async fn get_profile(&self) -> ApiResult<User> {
        self.get("/users/profile").await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<User> {
        let user: User = self.put("/users/profile", update).await?;
        // keep the cached indicator in step with the backend
        if let Ok(json) = serde_json::to_string(&user) {
            self.store().set(USER_KEY, json);
        } else {
            warn!("could not refresh stored user");
        }
        Ok(user)
    }

    pub async fn list_addresses(&self) -> ApiResult<Vec<Address>> {
        self.get("/users/addresses").await
    }

    pub async fn add_address(&self, address: &Address) -> ApiResult<Vec<Address>> {
        self.post("/users/addresses", address).await
    }
}
