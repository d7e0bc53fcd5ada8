use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::models::{InitiatePayment, Order, PaymentSession, VerifyPayment};

impl ApiClient {
    // Result goes straight to the gateway's checkout script
    pub async fn initiate_payment(&self, request: &InitiatePayment) -> ApiResult<PaymentSession> {
        self.post("/payments/initiate", request).await
    }

    pub async fn verify_payment(&self, request: &VerifyPayment) -> ApiResult<Order> {
        self.post("/payments/verify", request).await
    }
}
