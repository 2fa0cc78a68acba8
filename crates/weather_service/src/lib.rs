//! Weather acquisition crate.
//!
//! Persistent multi-entry cache with TTL and daily quota, preset readings,
//! and the deduplicating fetch service that publishes readings.

pub mod cache;
pub mod clock;
pub mod presets;
pub mod provider;
pub mod service;

pub use cache::{city_key, coords_key, quantize, CacheEntry, CacheStore};
pub use clock::{Clock, SystemClock};
pub use provider::WeatherProvider;
pub use service::{CachePolicy, FetchOrigin, Fetched, WeatherService};
