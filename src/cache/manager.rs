/// Generic keyed cache with batched, coalesced population
///
/// `retrieve` answers synchronously from the cache or schedules the key for
/// production and returns `None` while it is pending. Keys requested before a
/// batch starts, or while one is running, are gathered into the next single
/// producer call. A pending key is never handed to the producer twice.
///
/// Population runs on the tokio runtime, so callers must be inside one.
use super::config::CacheOptions;
use crate::logger::{self, LogTag};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Produces values for a batch of keys
///
/// Every call returns a fresh single-pass iterator; results are consumed one
/// key at a time. Keys the iterator never yields resolve to "no value".
pub trait ItemProducer<V>: Send + Sync {
    fn produce(&self, keys: Vec<String>) -> Box<dyn Iterator<Item = (String, V)> + Send>;
}

/// Cache entry with TTL tracking
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
        }
    }

    fn is_expired(&self, expiry: Option<Duration>) -> bool {
        expiry.map_or(false, |ttl| self.inserted_at.elapsed() > ttl)
    }
}

#[derive(Debug, Clone)]
enum Pending<V> {
    Waiting,
    Ready(V),
    Missing,
}

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub inserts: u64,
    pub producer_calls: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState<V> {
    entries: LruCache<String, CacheEntry<V>>,
    pending: HashMap<String, watch::Sender<Pending<V>>>,
    queue: Vec<String>,
    batch_scheduled: bool,
    metrics: CacheMetrics,
}

pub struct ItemCache<V> {
    name: String,
    producer: Arc<dyn ItemProducer<V>>,
    expiry: Option<Duration>,
    state: Mutex<CacheState<V>>,
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

impl<V> ItemCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(
        name: impl Into<String>,
        producer: Arc<dyn ItemProducer<V>>,
        options: CacheOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            producer,
            expiry: options.expiry,
            state: Mutex::new(CacheState {
                entries: LruCache::new(non_zero(options.capacity)),
                pending: HashMap::new(),
                queue: Vec::new(),
                batch_scheduled: false,
                metrics: CacheMetrics::default(),
            }),
        })
    }

    /// Cached value, or `None` after scheduling population of `key`
    pub fn retrieve(self: &Arc<Self>, key: &str) -> Option<V> {
        let mut state = self.state.lock();
        if let Some(value) = self.fresh(&mut state, key) {
            return Some(value);
        }
        self.schedule(&mut state, key);
        None
    }

    /// Like `retrieve` but waits for the in-flight population
    pub async fn retrieve_async(self: &Arc<Self>, key: &str) -> Option<V> {
        let mut rx = {
            let mut state = self.state.lock();
            if let Some(value) = self.fresh(&mut state, key) {
                return Some(value);
            }
            self.schedule(&mut state, key)
        };

        let settled = rx
            .wait_for(|pending| !matches!(pending, Pending::Waiting))
            .await;
        match settled.as_deref() {
            Ok(Pending::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.state.lock().pending.contains_key(key)
    }

    /// Change the capacity, evicting least recently retrieved entries first
    pub fn resize(&self, capacity: usize) {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.resize(non_zero(capacity));
        let evicted = before.saturating_sub(state.entries.len());
        state.metrics.evictions += evicted as u64;

        logger::debug(
            LogTag::Cache,
            &format!(
                "{}: capacity set to {} ({} evicted)",
                self.name, capacity, evicted
            ),
        );
    }

    /// Keep the capacity in step with a reactive source
    ///
    /// The follower stops when the source closes or the cache is dropped.
    pub fn follow_capacity<F>(
        self: &Arc<Self>,
        mut source: watch::Receiver<usize>,
        to_capacity: F,
    ) -> JoinHandle<()>
    where
        F: Fn(usize) -> usize + Send + 'static,
    {
        self.resize(to_capacity(*source.borrow_and_update()));

        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while source.changed().await.is_ok() {
                let capacity = to_capacity(*source.borrow_and_update());
                match cache.upgrade() {
                    Some(cache) => cache.resize(capacity),
                    None => break,
                }
            }
        })
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().entries.cap().get()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, key: &str) {
        self.state.lock().entries.pop(key);
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }

    fn fresh(&self, state: &mut CacheState<V>, key: &str) -> Option<V> {
        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(self.expiry) => {
                let value = entry.value.clone();
                state.metrics.hits += 1;
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            state.entries.pop(key);
            state.metrics.expirations += 1;
        }
        state.metrics.misses += 1;
        None
    }

    /// Queue `key` unless it is already pending; returns a receiver for its result
    fn schedule(self: &Arc<Self>, state: &mut CacheState<V>, key: &str) -> watch::Receiver<Pending<V>> {
        if let Some(tx) = state.pending.get(key) {
            return tx.subscribe();
        }

        let (tx, rx) = watch::channel(Pending::Waiting);
        state.pending.insert(key.to_string(), tx);
        state.queue.push(key.to_string());

        if !state.batch_scheduled {
            state.batch_scheduled = true;
            tokio::spawn(Arc::clone(self).flush());
        }
        rx
    }

    async fn flush(self: Arc<Self>) {
        loop {
            // let callers in the same turn add their keys to this batch
            tokio::task::yield_now().await;

            let keys = {
                let mut state = self.state.lock();
                if state.queue.is_empty() {
                    state.batch_scheduled = false;
                    return;
                }
                state.metrics.producer_calls += 1;
                std::mem::take(&mut state.queue)
            };

            self.run_batch(keys).await;
        }
    }

    async fn run_batch(&self, keys: Vec<String>) {
        logger::debug(
            LogTag::Cache,
            &format!("{}: producing batch of {} keys", self.name, keys.len()),
        );

        let mut remaining: HashSet<String> = keys.iter().cloned().collect();
        let produced = self.producer.produce(keys);

        for (key, value) in produced {
            remaining.remove(&key);
            self.store(key, value);
            tokio::task::yield_now().await;
        }

        if remaining.is_empty() {
            return;
        }

        let mut state = self.state.lock();
        for key in remaining {
            if let Some(tx) = state.pending.remove(&key) {
                tx.send_replace(Pending::Missing);
            }
        }
    }

    fn store(&self, key: String, value: V) {
        let mut state = self.state.lock();

        let evicted = state
            .entries
            .push(key.clone(), CacheEntry::new(value.clone()))
            .filter(|(old_key, _)| *old_key != key);
        if let Some((old_key, _)) = evicted {
            state.metrics.evictions += 1;
            logger::verbose(
                LogTag::Cache,
                &format!("{}: evicted {}", self.name, old_key),
            );
        }
        state.metrics.inserts += 1;

        if let Some(tx) = state.pending.remove(&key) {
            tx.send_replace(Pending::Ready(value));
        }
    }
}
