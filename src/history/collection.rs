/// Paginated collections and their wire shape
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// `{ entries, entries_found, entries_limit, entries_total }`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CollectionResponse<T> {
    pub entries: Vec<T>,
    pub entries_found: u64,
    /// -1 when the backend applies no limit
    pub entries_limit: i64,
    pub entries_total: u64,
    #[serde(
        default,
        deserialize_with = "crate::apis::wire::optional_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub total_usd_value: Option<BigDecimal>,
}

/// History entry plus accounting metadata as returned by the backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EntryWithMeta<T> {
    pub entry: T,
    #[serde(default)]
    pub ignored_in_accounting: bool,
    #[serde(default)]
    pub customized: bool,
}

/// Entry with its metadata merged in, as exposed by the stores
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry<T> {
    #[serde(flatten)]
    pub inner: T,
    pub ignored_in_accounting: bool,
    pub customized: bool,
}

impl<T> Deref for Entry<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<EntryWithMeta<T>> for Entry<T> {
    fn from(value: EntryWithMeta<T>) -> Self {
        Self {
            inner: value.entry,
            ignored_in_accounting: value.ignored_in_accounting,
            customized: value.customized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection<T> {
    pub data: Vec<T>,
    pub found: u64,
    pub limit: i64,
    pub total: u64,
    pub total_usd_value: Option<BigDecimal>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            found: 0,
            limit: 0,
            total: 0,
            total_usd_value: None,
        }
    }
}

impl<T> Collection<T> {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether more entries match than the limit lets through
    pub fn is_limited(&self) -> bool {
        self.limit >= 0 && self.found > self.limit as u64
    }
}

impl<T> From<CollectionResponse<EntryWithMeta<T>>> for Collection<Entry<T>> {
    fn from(response: CollectionResponse<EntryWithMeta<T>>) -> Self {
        Self {
            data: response.entries.into_iter().map(Entry::from).collect(),
            found: response.entries_found,
            limit: response.entries_limit,
            total: response.entries_total,
            total_usd_value: response.total_usd_value,
        }
    }
}

/// Collection together with the payload that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T, P> {
    /// `None` until the first read completes
    pub payload: Option<P>,
    pub collection: Collection<T>,
}

impl<T, P> Default for Page<T, P> {
    fn default() -> Self {
        Self {
            payload: None,
            collection: Collection::default(),
        }
    }
}
