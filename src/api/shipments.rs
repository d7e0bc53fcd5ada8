use crate::client::{ApiClient, path_segment};
use crate::error::ApiResult;
use crate::models::Shipment;

impl ApiClient {
    pub async fn track_shipment(&self, tracking_number: &str) -> ApiResult<Shipment> {
        self.get(&format!(
            "/shipments/track/{}",
            path_segment(tracking_number.trim())?
        ))
            .await
    }

    pub async fn order_shipment(&self, order_id: &str) -> ApiResult<Shipment> {
        self.get(&format!("/orders/{}/shipment", path_segment(order_id)?))
            .await
    }
}
