//! Issues search requests and applies their results to the [`ResultCache`].
//!
//! At most one request per key is outstanding from the coordinator's point of
//! view: callers asking for a key that is already pending join it instead of
//! issuing another. Every request carries an issue-sequence number and only
//! the most recently issued request for a key may write that key's entry, so a
//! slow response overtaken by a newer one is dropped on arrival.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::query::cache::{CacheEntry, CacheStatus, ResultCache};
use crate::query::error::CatalogError;
use crate::query::key::QueryKey;
use crate::query::transport::CatalogTransport;

/// What [`FetchCoordinator::ensure_fetched`] did for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDisposition {
    /// Fresh data was cached; no request was made.
    Hit,
    /// A request for the key was already in flight; the caller joined it.
    Joined,
    /// A new request was issued.
    Issued,
}

/// A caller's interest in one key.
///
/// Dropping the subscription stops delivery to that caller only; the request
/// keeps running and still populates the shared cache.
#[derive(Debug)]
pub struct Subscription {
    key: QueryKey,
    disposition: FetchDisposition,
    rx: watch::Receiver<CacheEntry>,
}

impl Subscription {
    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub const fn disposition(&self) -> FetchDisposition {
        self.disposition
    }

    /// The entry as it is right now.
    #[must_use]
    pub fn current(&self) -> CacheEntry {
        self.rx.borrow().clone()
    }

    /// Waits for the next change of the entry. Returns `false` once the entry
    /// has been evicted from the cache.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until the entry leaves `Pending`.
    ///
    /// # Errors
    ///
    /// Returns the error stored in the entry when the request failed, or a
    /// transport error when the entry was evicted while waiting.
    pub async fn settled(&mut self) -> Result<CacheEntry, CatalogError> {
        loop {
            let entry = self.rx.borrow_and_update().clone();
            match entry.status() {
                CacheStatus::Success => return Ok(entry),
                CacheStatus::Error => {
                    return Err(entry.error().cloned().unwrap_or_else(|| {
                        CatalogError::transport(None, "request failed without details")
                    }));
                }
                CacheStatus::Pending => {}
            }

            if self.rx.changed().await.is_err() {
                return Err(CatalogError::transport(
                    None,
                    format!("cache entry for {} was evicted while pending", self.key),
                ));
            }
        }
    }
}

pub struct FetchCoordinator {
    cache: Arc<ResultCache>,
    transport: Arc<dyn CatalogTransport>,
    next_seq: AtomicU64,
}

impl FetchCoordinator {
    #[must_use]
    pub fn new(cache: Arc<ResultCache>, transport: Arc<dyn CatalogTransport>) -> Self {
        Self {
            cache,
            transport,
            next_seq: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    #[must_use]
    pub fn transport(&self) -> Arc<dyn CatalogTransport> {
        Arc::clone(&self.transport)
    }

    /// Makes sure `key` is cached or being fetched and subscribes the caller to it.
    ///
    /// Fresh entries are served as they are. Pending ones are joined, even when
    /// invalidated while in flight; they stay stale after completing so the
    /// next access re-fetches. Missing, stale and failed entries trigger a new
    /// request; the entry turns `Pending` before the request starts and keeps
    /// its previous data.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn ensure_fetched(&self, key: &QueryKey) -> Subscription {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut settled_hit = false;

        let (issued, rx) = self.cache.begin_unless(key, seq, |entry| {
            if entry.is_pending() {
                return true;
            }
            settled_hit = !entry.needs_fetch();
            settled_hit
        });

        let disposition = if issued {
            self.issue(key.clone(), seq);
            FetchDisposition::Issued
        } else if settled_hit {
            debug!(key = %key, "Cache hit");
            metrics::counter!("libris_cache_hits_total").increment(1);
            FetchDisposition::Hit
        } else {
            debug!(key = %key, "Joining in-flight request");
            FetchDisposition::Joined
        };

        Subscription {
            key: key.clone(),
            disposition,
            rx,
        }
    }

    /// Issues a new request for `key` regardless of the entry's state.
    ///
    /// An older request still in flight for the key is superseded: its
    /// response will be discarded when it arrives.
    pub fn refetch(&self, key: &QueryKey) -> Subscription {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (_, rx) = self.cache.begin_unless(key, seq, |_| false);
        self.issue(key.clone(), seq);

        Subscription {
            key: key.clone(),
            disposition: FetchDisposition::Issued,
            rx,
        }
    }

    fn issue(&self, key: QueryKey, seq: u64) {
        debug!(key = %key, seq, "Issuing search request");
        metrics::counter!("libris_cache_misses_total").increment(1);

        let cache = Arc::clone(&self.cache);
        let transport = Arc::clone(&self.transport);

        tokio::spawn(async move {
            let result = transport.search(&key).await;

            let outcome = if result.is_ok() { "success" } else { "error" };
            if let Err(err) = &result {
                warn!(key = %key, seq, error = %err, "Search request failed");
            }
            metrics::counter!("libris_fetches_total", "outcome" => outcome).increment(1);

            let applied = cache.update(&key, |entry| entry.complete(seq, result));
            if !applied {
                debug!(key = %key, seq, "Discarding superseded response");
                metrics::counter!("libris_stale_completions_total").increment(1);
            }
        });
    }
}
