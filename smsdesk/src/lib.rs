//! # smsdesk
//!
//! Async client core for an SMS number marketplace: browse prices, buy a
//! temporary number and wait for the verification code it receives.
//!
//! ## Features
//!
//! - **Price windows**: paginated listings cached per `(offset, service, country)`
//!   with a TTL, and concurrent requests for the same window collapsed into one
//!   backend call.
//! - **Purchase polling**: after a number is bought its status is checked on a
//!   fixed interval until a code arrives, the activation is cancelled, or the
//!   deadline passes. Credits are refunded at most once when no code came.
//! - **Session handling**: bearer token on every request; a 401 anywhere signs
//!   the user out and notifies subscribers.
//!
//! ## Getting Started
//!
//! ```no_run
//! use smsdesk::context::AppContext;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let ctx = AppContext::from_config_file("config.yml")?;
//! let page = ctx.prices().window(0, Some("telegram"), None).await?;
//!
//! let mut poller = ctx.purchase_poller();
//! poller.purchase(&page.prices[0].service, &page.prices[0].country).await?;
//! let done = poller.wait().await;
//! println!("{:?}", done.outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `api`: REST client and wire types.
//! - `context`: the application object wiring everything together.
//! - `poller`: purchase state machine and status polling.
//! - `prices`: cached price browsing.
//! - `session`: authentication state and sign-out notifications.
pub mod api;
pub mod context;
pub mod error;
pub mod logging;
pub mod poller;
pub mod prices;
pub mod session;

pub use error::ApiError;
pub use smsdesk_cache as cache;
pub use smsdesk_config as config;
pub use smsdesk_config::backoff;
// re-export
pub use async_trait;
pub use reqwest;
pub use serde;
pub use serde_json;
pub use tracing;
pub use tracing_subscriber;
