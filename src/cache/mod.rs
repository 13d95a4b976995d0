/// Keyed item caches
///
/// `ItemCache` maps a normalized string key to a lazily produced value with
/// batched, coalesced population. `BlockieCache` is the address identicon
/// cache built on it.
pub mod blockie;
pub mod config;
pub mod manager;

pub use blockie::{Blockie, BlockieCache};
pub use config::{blockie_capacity, CacheOptions};
pub use manager::{CacheMetrics, ItemCache, ItemProducer};
