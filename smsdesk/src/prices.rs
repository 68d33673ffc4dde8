//! Paginated price browsing backed by the window cache.
use std::{sync::Arc, time::Duration};

use smsdesk_cache::{CacheStats, Clock, SystemClock, WindowCache};
use tracing::info;

use crate::api::{PricePage, PriceQuery, PriceUpdate, SmsApiClient};
use crate::ApiError;

/// Price listing for the admin and purchase screens.
///
/// Identical windows requested within the TTL hit the backend once; any
/// price mutation made through the browser drops every cached window.
#[derive(Debug, Clone)]
pub struct PriceBrowser {
    api: Arc<SmsApiClient>,
    cache: WindowCache<PricePage, ApiError>,
    page_size: u32,
}

impl PriceBrowser {
    pub fn new(api: Arc<SmsApiClient>, ttl: Duration, page_size: u32) -> Self {
        Self::with_clock(api, ttl, page_size, Arc::new(SystemClock))
    }

    pub fn with_clock(
        api: Arc<SmsApiClient>,
        ttl: Duration,
        page_size: u32,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            cache: WindowCache::with_clock(ttl, clock),
            page_size,
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The page starting at `offset` for the given filters.
    pub async fn window(
        &self,
        offset: u64,
        service: Option<&str>,
        country: Option<&str>,
    ) -> Result<PricePage, ApiError> {
        let mut query = PriceQuery::new(offset, self.page_size);
        if let Some(service) = service {
            query = query.service(service);
        }
        if let Some(country) = country {
            query = query.country(country);
        }

        let api = Arc::clone(&self.api);
        self.cache
            .get_or_fetch(offset, service, country, move || async move {
                api.list_prices(&query).await
            })
            .await
    }

    /// Admin price change. Cached windows are dropped once the backend
    /// accepted it.
    pub async fn update_price(&self, update: &PriceUpdate) -> Result<(), ApiError> {
        self.api.update_price(update).await?;
        self.cache.invalidate_all();
        info!("price cache invalidated after update");
        Ok(())
    }

    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
