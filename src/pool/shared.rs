use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::equality::{EqualityPolicy, Structural};
use crate::pool::{CacheStats, ExampleBuilder, ExampleCache, Lease};
use crate::PoolResult;

/// Wraps an [ExampleCache] in a mutex so that it can be shared between threads.
///
/// All operations lock the cache for their whole duration, including the time spent in the
/// example builder on a miss. Therefore this is a convenient rather than a scalable solution.
///
/// # Examples
/// ```
/// # use exemplar::pool::{CacheSettings, ExampleCache, SharedExampleCache};
/// # use std::sync::Arc;
/// let builder = |record: &u64, _label: Option<&str>| -> anyhow::Result<Vec<u64>> {
///     Ok(vec![*record; 8])
/// };
/// let cache = Arc::new(SharedExampleCache::new(
///     ExampleCache::new(builder, CacheSettings::enabled(4)).unwrap(),
/// ));
///
/// let workers: Vec<_> = (0..4u64)
///     .map(|worker| {
///         let cache = cache.clone();
///         std::thread::spawn(move || {
///             let example = cache.request(&worker, None).unwrap();
///             assert_eq!(example[0], worker);
///             cache.give_back(example).unwrap();
///         })
///     })
///     .collect();
///
/// for worker in workers {
///     worker.join().unwrap();
/// }
///
/// assert_eq!(cache.len(), 4);
/// cache.shutdown();
/// ```
pub struct SharedExampleCache<K, B: ExampleBuilder<K>, P = Structural> {
    inner: Mutex<ExampleCache<K, B, P>>,
}

impl<K, B, P> SharedExampleCache<K, B, P>
where
    K: Clone,
    B: ExampleBuilder<K>,
    P: EqualityPolicy<K>,
{
    /// Wraps the given cache.
    pub fn new(cache: ExampleCache<K, B, P>) -> Self {
        SharedExampleCache {
            inner: Mutex::new(cache),
        }
    }

    /// Locks the cache.
    ///
    /// A panic within a builder doesn't leave the cache in an inconsistent state, therefore a
    /// poisoned lock is simply taken over.
    fn lock(&self) -> MutexGuard<'_, ExampleCache<K, B, P>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests the example for the given record. See [ExampleCache::request].
    pub fn request(&self, record: &K, label: Option<&str>) -> PoolResult<Lease<B::Example>> {
        self.lock().request(record, label)
    }

    /// Gives back a previously requested example. See [ExampleCache::give_back].
    pub fn give_back(&self, lease: Lease<B::Example>) -> PoolResult<()> {
        self.lock().give_back(lease)
    }

    /// Shuts the cache down. See [ExampleCache::shutdown].
    pub fn shutdown(&self) {
        self.lock().shutdown()
    }

    /// Releases all cached examples. See [ExampleCache::flush].
    pub fn flush(&self) -> PoolResult<()> {
        self.lock().flush()
    }

    /// Determines if the wrapped cache actually stores examples.
    pub fn caches_examples(&self) -> bool {
        self.lock().caches_examples()
    }

    /// Returns the number of cached examples.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Determines if the cache is completely empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the metrics of the wrapped cache.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    /// Unwraps the underlying cache.
    pub fn into_inner(self) -> ExampleCache<K, B, P> {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
