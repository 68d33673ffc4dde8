//! Wire types for the marketplace backend. Field names are camelCase on the
//! wire.
use serde::{Deserialize, Deserializer, Serialize};

/// Price of one service in one country. `service` and `country` are opaque
/// backend codes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub service: String,
    pub country: String,
    pub price_brl: f64,
    pub price_usd: f64,
}

/// One page of the price listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePage {
    pub prices: Vec<PriceEntry>,
    pub total: u64,
}

/// Which slice of the price listing to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuery {
    pub offset: u64,
    pub limit: u32,
    pub service: Option<String>,
    pub country: Option<String>,
}

impl PriceQuery {
    pub fn new(offset: u64, limit: u32) -> Self {
        Self {
            offset,
            limit,
            service: None,
            country: None,
        }
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into()).filter(|s: &String| !s.is_empty());
        self
    }

    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into()).filter(|c: &String| !c.is_empty());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseRequest {
    pub service: String,
    pub country: String,
}

/// Result of a successful number purchase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub balance: f64,
    pub activation_id: String,
    pub phone_number: String,
    pub credits_spent: f64,
}

/// Latest known state of an activation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivationStatus {
    #[serde(default, deserialize_with = "string_or_number")]
    pub status: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ActivationStatus {
    /// The verification code, if one has arrived and is not blank.
    pub fn received_code(&self) -> Option<&str> {
        self.code.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusEnvelope {
    #[serde(default)]
    pub array: Vec<ActivationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub activation_id: String,
    pub credits_spent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefundReceipt {
    pub balance: f64,
}

/// Admin price change for one service/country pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceUpdate {
    pub service: String,
    pub country: String,
    pub price_brl: f64,
    pub price_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceResponse {
    pub balance: f64,
}

// Status codes come back as "6" from some endpoints and 6 from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected string or number status, got {other}"
        ))),
    }
}
