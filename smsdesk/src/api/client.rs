use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use smsdesk_config::{
    http::{build_http_client, send_with_retry, HttpClientParams},
    ApiSettings,
};
use tracing::{debug, info, instrument, warn};

use super::models::{
    ActivationStatus, BalanceResponse, Credentials, LoginResponse, PricePage,
    PriceQuery, PriceUpdate, PurchaseReceipt, PurchaseRequest, RefundReceipt,
    RefundRequest, StatusEnvelope,
};
use super::ActivationApi;
use crate::session::{Session, SignOutReason};
use crate::ApiError;

/// Async client for the marketplace REST API.
///
/// Every request carries the session's bearer token when there is one. A 401
/// from any endpoint clears the session.
#[derive(Debug, Clone)]
pub struct SmsApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
    retry_max_elapsed: Duration,
}

impl SmsApiClient {
    pub fn new(settings: &ApiSettings, session: Arc<Session>) -> Result<Self, ApiError> {
        let http = build_http_client(HttpClientParams::from_settings(settings))?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            session,
            retry_max_elapsed: settings.retry_max_elapsed(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// URL helper.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `path` with `segment` appended as one percent-encoded path segment.
    fn segment_url(&self, path: &str, segment: &str) -> Result<String, ApiError> {
        let mut url = reqwest::Url::parse(&self.url(path))
            .map_err(|err| ApiError::Validation(format!("invalid url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Validation(format!("cannot append to {}", self.base_url)))?
            .push(segment);
        Ok(url.into())
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    // ── Transport helpers ─────────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = send_with_retry(
            || self.authorized(self.http.get(&url).query(query)),
            self.retry_max_elapsed,
        )
        .await?;
        self.read_json(resp).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .authorized(self.http.request(method, self.url(path)).json(body))
            .send()
            .await?;
        self.read_json(resp).await
    }

    async fn read_json<T: DeserializeOwned>(&self, resp: Response) -> Result<T, ApiError> {
        let resp = self.check_status(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn check_status(&self, resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            warn!(url = %resp.url(), "backend rejected credentials");
            self.session.clear(SignOutReason::Unauthorized);
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Backend {
                status: status.as_u16(),
                message: backend_message(&body),
            });
        }
        Ok(resp)
    }

    // ── Auth ──────────────────────────────────────────────────────────

    /// Exchange credentials for a token and store it in the session.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        validate_credentials(credentials)?;
        let resp: LoginResponse = self
            .send_json(Method::POST, "/auth/login", credentials)
            .await?;
        self.session.set_token(resp.access_token);
        info!("signed in");
        Ok(())
    }

    pub fn logout(&self) {
        self.session.clear(SignOutReason::Logout);
    }

    // ── Read endpoints ────────────────────────────────────────────────

    pub async fn balance(&self) -> Result<f64, ApiError> {
        let resp: BalanceResponse = self.get_json(self.url("/credits/balance"), &[]).await?;
        Ok(resp.balance)
    }

    /// Fetch one page of prices.
    ///
    /// A service filter goes to `filter-by-name` (with the country forwarded
    /// when both are set), a country filter alone to `filter-by-country-name`,
    /// and no filter to the plain listing.
    #[instrument(skip(self), fields(offset = query.offset, limit = query.limit))]
    pub async fn list_prices(&self, query: &PriceQuery) -> Result<PricePage, ApiError> {
        let mut params = vec![
            ("limit", query.limit.to_string()),
            ("offset", query.offset.to_string()),
        ];
        let path = match (&query.service, &query.country) {
            (Some(service), country) => {
                params.push(("serviceName", service.clone()));
                if let Some(country) = country {
                    params.push(("countryName", country.clone()));
                }
                "/credits/prices/filter-by-name"
            }
            (None, Some(country)) => {
                params.push(("countryName", country.clone()));
                "/credits/prices/filter-by-country-name"
            }
            (None, None) => {
                params.push(("includeTotal", "true".to_string()));
                "/credits/prices"
            }
        };

        let page: PricePage = self.get_json(self.url(path), &params).await?;
        debug!(
            "Fetched {} prices (total: {})",
            page.prices.len(),
            page.total
        );
        Ok(page)
    }

    // ── Write endpoints ───────────────────────────────────────────────

    #[instrument(skip(self))]
    pub async fn buy_number(
        &self,
        service: &str,
        country: &str,
    ) -> Result<PurchaseReceipt, ApiError> {
        let request = PurchaseRequest {
            service: required("service", service)?,
            country: required("country", country)?,
        };
        let receipt: PurchaseReceipt =
            self.send_json(Method::POST, "/sms/buy", &request).await?;
        info!(
            activation_id = %receipt.activation_id,
            credits_spent = receipt.credits_spent,
            "number purchased"
        );
        Ok(receipt)
    }

    /// Current status of an activation. An empty status list means the
    /// backend has nothing new yet.
    pub async fn activation_status(
        &self,
        activation_id: &str,
    ) -> Result<ActivationStatus, ApiError> {
        validate_activation_id(activation_id)?;
        let url = self.segment_url("/sms/status", activation_id)?;
        let envelope: StatusEnvelope = self.get_json(url, &[]).await?;
        Ok(envelope.array.into_iter().next().unwrap_or_default())
    }

    #[instrument(skip(self))]
    pub async fn refund(
        &self,
        activation_id: &str,
        credits_spent: f64,
    ) -> Result<RefundReceipt, ApiError> {
        validate_activation_id(activation_id)?;
        let request = RefundRequest {
            activation_id: activation_id.to_string(),
            credits_spent,
        };
        let receipt: RefundReceipt = self
            .send_json(Method::POST, "/credits/refunded", &request)
            .await?;
        info!(balance = receipt.balance, "refund accepted");
        Ok(receipt)
    }

    /// Admin: change the price of one service/country pair.
    pub async fn update_price(&self, update: &PriceUpdate) -> Result<(), ApiError> {
        validate_price_update(update)?;
        let resp = self
            .authorized(
                self.http
                    .request(Method::PUT, self.url("/credits/prices"))
                    .json(update),
            )
            .send()
            .await?;
        self.check_status(resp).await?;
        info!(service = %update.service, country = %update.country, "price updated");
        Ok(())
    }
}

#[async_trait]
impl ActivationApi for SmsApiClient {
    async fn buy_number(&self, service: &str, country: &str) -> Result<PurchaseReceipt, ApiError> {
        SmsApiClient::buy_number(self, service, country).await
    }

    async fn activation_status(&self, activation_id: &str) -> Result<ActivationStatus, ApiError> {
        SmsApiClient::activation_status(self, activation_id).await
    }

    async fn refund(
        &self,
        activation_id: &str,
        credits_spent: f64,
    ) -> Result<RefundReceipt, ApiError> {
        SmsApiClient::refund(self, activation_id, credits_spent).await
    }
}

// ── Validation ────────────────────────────────────────────────────────

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

fn validate_credentials(credentials: &Credentials) -> Result<(), ApiError> {
    let email = credentials.email.trim();
    let well_formed = email
        .split_once('@')
        .map(|(user, domain)| !user.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !well_formed {
        return Err(ApiError::Validation("Enter a valid email address".into()));
    }
    if credentials.password.is_empty() {
        return Err(ApiError::Validation("Password is required".into()));
    }
    Ok(())
}

// Ids are opaque backend strings. Dot segments would be normalised out of
// the status URL.
fn validate_activation_id(activation_id: &str) -> Result<(), ApiError> {
    if activation_id.trim().is_empty() || activation_id == "." || activation_id == ".." {
        return Err(ApiError::Validation(format!("invalid activation id: {activation_id:?}")));
    }
    Ok(())
}

fn validate_price_update(update: &PriceUpdate) -> Result<(), ApiError> {
    required("service", &update.service)?;
    required("country", &update.country)?;
    let valid = |p: f64| p.is_finite() && p >= 0.0;
    if !valid(update.price_brl) || !valid(update.price_usd) {
        return Err(ApiError::Validation("Prices must be non-negative".into()));
    }
    Ok(())
}

/// Pull a human readable message out of an error body.
fn backend_message(body: &str) -> String {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    let field = json.get("message").or_else(|| json.get("error"));
    match field {
        Some(serde_json::Value::String(msg)) => msg.clone(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        _ => body.trim().to_string(),
    }
}
