/// Keyed item cache options
///
/// Capacity bounds the entry count (LRU eviction once exceeded). Expiry is
/// optional: `None` keeps entries until capacity pushes them out.
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Maximum number of entries
    pub capacity: usize,

    /// Time-to-live of an entry, `None` for no expiry
    pub expiry: Option<Duration>,
}

impl CacheOptions {
    /// Address identicons: deterministic, never stale
    pub fn blockies(min_size: usize, items_per_page: usize) -> Self {
        Self {
            capacity: blockie_capacity(min_size, items_per_page),
            expiry: None,
        }
    }

    pub fn custom(capacity: usize, expiry: Option<Duration>) -> Self {
        Self { capacity, expiry }
    }
}

/// Three table pages worth of addresses, never below `min_size`
pub fn blockie_capacity(min_size: usize, items_per_page: usize) -> usize {
    min_size.max(items_per_page.saturating_mul(3))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blockie_capacity_follows_page_size() {
        assert_eq!(blockie_capacity(200, 10), 200);
        assert_eq!(blockie_capacity(200, 100), 300);
        assert_eq!(CacheOptions::blockies(200, 10).expiry, None);
    }
}
