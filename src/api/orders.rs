use reqwest::Method;
use serde_json::json;
use tracing::info;

use crate::client::{ApiClient, RequestOptions, path_segment};
use crate::error::ApiResult;
use crate::idempotency::{IDEMPOTENCY_HEADER, generate_idempotency_key};
use crate::models::{CreateOrder, Order};
use crate::session::StorefrontEvent;

impl ApiClient {
    /// Submit a checkout. A fresh idempotency key is generated for this
    /// attempt and reused by its transient-failure retries, so the backend can
    /// collapse duplicates into one order.
    pub async fn create_order(&self, order: &CreateOrder) -> ApiResult<Order> {
        let key = generate_idempotency_key();
        self.create_order_with_key(order, &key).await
    }

    pub async fn create_order_with_key(&self, order: &CreateOrder, key: &str) -> ApiResult<Order> {
        let options = RequestOptions::new(Method::POST)
            .json(order)?
            .header(IDEMPOTENCY_HEADER, key);

        let created: Order = self.request_with_retry("/orders", options).await?;
        info!(order_id = %created.id, idempotency_key = key, "order created");

        // the backend empties the cart on checkout
        self.events().publish(StorefrontEvent::cart_changed());
        Ok(created)
    }

    pub async fn list_orders(&self) -> ApiResult<Vec<Order>> {
        self.get("/orders").await
    }

    pub async fn get_order(&self, id: &str) -> ApiResult<Order> {
        self.get(&format!("/orders/{}", path_segment(id)?)).await
    }

    pub async fn cancel_order(&self, id: &str) -> ApiResult<Order> {
        self.post(&format!("/orders/{}/cancel", path_segment(id)?), &json!({}))
            .await
    }
}
