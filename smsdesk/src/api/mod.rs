//! HTTP access to the marketplace backend.
mod client;
pub mod models;

pub use client::SmsApiClient;
pub use models::{
    ActivationStatus, BalanceResponse, Credentials, LoginResponse, PriceEntry,
    PricePage, PriceQuery, PriceUpdate, PurchaseReceipt, PurchaseRequest,
    RefundReceipt, RefundRequest, StatusEnvelope,
};

use crate::ApiError;
use async_trait::async_trait;

/// The calls a purchase needs: buy, check, refund.
#[async_trait]
pub trait ActivationApi: Send + Sync {
    async fn buy_number(&self, service: &str, country: &str) -> Result<PurchaseReceipt, ApiError>;

    async fn activation_status(&self, activation_id: &str) -> Result<ActivationStatus, ApiError>;

    async fn refund(
        &self,
        activation_id: &str,
        credits_spent: f64,
    ) -> Result<RefundReceipt, ApiError>;
}
