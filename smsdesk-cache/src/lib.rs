//! Time-bounded window cache for paginated listings.
//!
//! Windows are keyed by `(offset, service filter, country filter)`, served
//! while younger than the TTL, and concurrent fetches of the same key are
//! collapsed into a single backend call.

mod clock;
mod window;
mod window_cache;

pub use clock::{Clock, ManualClock, SystemClock};
pub use window::{is_valid, CacheWindow, WindowKey, DEFAULT_TTL};
pub use window_cache::{CacheStats, WindowCache};
