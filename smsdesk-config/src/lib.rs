//! Configuration for smsdesk clients.
//!
//! Raw YAML access through [`Configurable`], typed [`Settings`] with sane
//! defaults, and the HTTP client builder every API call goes through.
pub mod config;
pub mod http;
pub mod settings;

pub use backoff;
pub use config::{ConfigError, Configurable};
pub use settings::{
    ApiSettings, CacheSettings, LoggingSettings, PollerSettings, Settings,
};
