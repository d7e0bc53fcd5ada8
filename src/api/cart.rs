use serde_json::json;

use crate::client::{ApiClient, path_segment};
use crate::error::ApiResult;
use crate::models::{AddToCart, Cart};
use crate::session::StorefrontEvent;

// The backend owns the cart; every successful mutation is announced on the bus
impl ApiClient {
    pub async fn get_cart(&self) -> ApiResult<Cart> {
        self.get("/cart").await
    }

    pub async fn add_to_cart(&self, item: &AddToCart) -> ApiResult<Cart> {
        let cart = self.post("/cart/items", item).await?;
        self.events().publish(StorefrontEvent::cart_changed());
        Ok(cart)
    }

    pub async fn update_cart_item(&self, item_id: &str, quantity: u32) -> ApiResult<Cart> {
        let cart = self
            .put(
                &format!("/cart/items/{}", path_segment(item_id)?),
                &json!({ "quantity": quantity }),
            )
            .await?;
        self.events().publish(StorefrontEvent::cart_changed());
        Ok(cart)
    }

    pub async fn remove_cart_item(&self, item_id: &str) -> ApiResult<Cart> {
        let cart = self
            .delete(&format!("/cart/items/{}", path_segment(item_id)?))
            .await?;
        self.events().publish(StorefrontEvent::cart_changed());
        Ok(cart)
    }

    pub async fn clear_cart(&self) -> ApiResult<()> {
        let _: serde_json::Value = self.delete("/cart").await?;
        self.events().publish(StorefrontEvent::cart_changed());
        Ok(())
    }
}
