//! The application object handed to every screen.
use std::{path::Path, sync::Arc};

use smsdesk_config::{ConfigError, Configurable, Settings};
use tracing::info;

use crate::api::{ActivationApi, SmsApiClient};
use crate::poller::{PollerOptions, PurchasePoller};
use crate::prices::PriceBrowser;
use crate::session::Session;
use crate::ApiError;

#[derive(thiserror::Error, Debug)]
pub enum ContextError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Client error: {0}")]
    Api(#[from] ApiError),
}

/// Session, client and caches for one running application.
#[derive(Debug)]
pub struct AppContext {
    config: serde_yaml::Value,
    settings: Settings,
    session: Arc<Session>,
    api: Arc<SmsApiClient>,
    prices: PriceBrowser,
}

impl Configurable for AppContext {
    fn config(&self) -> &serde_yaml::Value {
        &self.config
    }
}

impl AppContext {
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, ContextError> {
        let config = Self::load_config(path)?;
        let settings = Settings::from_value(&config)?;
        Self::build(config, settings)
    }

    pub fn from_settings(settings: Settings) -> Result<Self, ContextError> {
        settings.validate()?;
        let config = serde_yaml::to_value(&settings).map_err(ConfigError::from)?;
        Self::build(config, settings)
    }

    fn build(config: serde_yaml::Value, settings: Settings) -> Result<Self, ContextError> {
        let session = Arc::new(Session::new());
        let api = Arc::new(SmsApiClient::new(&settings.api, Arc::clone(&session))?);
        let prices = PriceBrowser::new(
            Arc::clone(&api),
            settings.cache.ttl(),
            settings.cache.page_size,
        );
        info!(base_url = %settings.api.base_url, "context ready");
        Ok(Self {
            config,
            settings,
            session,
            api,
            prices,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn api(&self) -> &Arc<SmsApiClient> {
        &self.api
    }

    pub fn prices(&self) -> &PriceBrowser {
        &self.prices
    }

    /// A fresh poller for one purchase screen.
    pub fn purchase_poller(&self) -> PurchasePoller {
        let api: Arc<dyn ActivationApi> = self.api.clone();
        PurchasePoller::new(api, PollerOptions::from_settings(&self.settings.poller))
    }

    /// Sign out and forget every cached window.
    pub fn shutdown(&self) {
        self.api.logout();
        self.prices.invalidate();
        info!("context shut down");
    }
}
