use std::sync::Arc;

use fnv::FnvHashMap;
use linked_hash_map::LinkedHashMap;

use crate::equality::{EqualityPolicy, Structural};
use crate::pool::entry::Entry;
use crate::pool::ledger::{BorrowLedger, Verification};
use crate::pool::{CacheSettings, Lease};
use crate::{PoolError, PoolResult};

/// Converts a typed record into a native example.
///
/// The builder is invoked by the cache on each miss and for each request which bypasses the
/// cache. It must not keep references to its inputs and should produce the same example for
/// the same inputs. Releasing a native example is up to its **Drop** implementation, therefore
/// anything built before a failure is released once it goes out of scope.
///
/// This trait is implemented for all closures with a matching signature.
pub trait ExampleBuilder<K> {
    /// The type of native examples being built.
    type Example;

    /// Builds the example for the given record and optional label.
    fn build(&mut self, record: &K, label: Option<&str>) -> anyhow::Result<Self::Example>;
}

impl<K, V, F> ExampleBuilder<K> for F
where
    F: FnMut(&K, Option<&str>) -> anyhow::Result<V>,
{
    type Example = V;

    fn build(&mut self, record: &K, label: Option<&str>) -> anyhow::Result<V> {
        self(record, label)
    }
}

/// Provides some metrics which describe how well a cache performs.
///
/// Note that all metrics are reset when [ExampleCache::flush] is called.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    requests: usize,
    hits: usize,
    misses: usize,
    bypassed: usize,
    build_failures: usize,
    returns: usize,
    evictions: usize,
}

impl CacheStats {
    /// Returns the total number of requests.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Returns the number of requests which were served from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Returns the number of requests which had to build a new example to be cached.
    ///
    /// Failed builds are not counted here but as [build_failures](CacheStats::build_failures).
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Returns the number of requests which bypassed the cache (as a label was given or as
    /// caching is disabled).
    pub fn bypassed(&self) -> usize {
        self.bypassed
    }

    /// Returns the number of failed builds.
    pub fn build_failures(&self) -> usize {
        self.build_failures
    }

    /// Returns the number of examples which have been given back.
    pub fn returns(&self) -> usize {
        self.returns
    }

    /// Returns the number of evicted examples.
    pub fn evictions(&self) -> usize {
        self.evictions
    }

    /// Returns the cache hit rate in percent.
    ///
    /// Only requests which were eligible for caching are taken into account.
    pub fn hit_rate(&self) -> f32 {
        match self.hits + self.misses {
            0 => 0.,
            n => self.hits as f32 / n as f32 * 100.,
        }
    }
}

/// Provides a size constrained pool of native examples.
///
/// The cache keeps up to **capacity** examples, each addressed by the record it was built for.
/// Records are compared using an [EqualityPolicy]. Once the capacity is exceeded, the least
/// recently requested example is evicted and thereby released.
///
/// Examples are handed out as [Lease]s. A pooled example has to be given back before it can be
/// requested again. In [Verification::Strict] mode, the cache detects violations of this
/// protocol. In [Verification::Relaxed] mode following it is up to the caller.
///
/// Note that this cache performs no locking. All operations require **&mut self**, therefore
/// sharing a cache between threads requires a [SharedExampleCache](crate::pool::SharedExampleCache)
/// or another form of external synchronization.
///
/// # Examples
/// ```
/// # use exemplar::pool::{CacheSettings, ExampleCache, Verification};
/// let builder = |record: &String, label: Option<&str>| -> anyhow::Result<String> {
///     Ok(format!("{}:{}", record, label.unwrap_or("-")))
/// };
///
/// let settings = CacheSettings::enabled(2).with_verification(Verification::Strict);
/// let mut cache = ExampleCache::new(builder, settings).unwrap();
///
/// for record in ["A", "B", "C"] {
///     let example = cache.request(&record.to_owned(), None).unwrap();
///     cache.give_back(example).unwrap();
/// }
///
/// // "A" was the least recently used example and has been evicted...
/// assert_eq!(cache.len(), 2);
/// assert_eq!(cache.contains(&"A".to_owned()), false);
/// assert_eq!(cache.contains(&"C".to_owned()), true);
///
/// // A labelled request always builds a fresh example which belongs to the caller...
/// let labelled = cache.request(&"C".to_owned(), Some("positive")).unwrap();
/// assert_eq!(labelled.is_pooled(), false);
/// assert_eq!(*labelled, "C:positive");
/// ```
pub struct ExampleCache<K, B: ExampleBuilder<K>, P = Structural> {
    builder: B,
    policy: P,
    enabled: bool,
    disposed: bool,
    capacity: usize,
    next_id: u64,
    entries: LinkedHashMap<u64, Entry<K, B::Example>>,
    index: FnvHashMap<u64, Vec<u64>>,
    ledger: Option<BorrowLedger>,
    stats: CacheStats,
}

impl<K, B> ExampleCache<K, B, Structural>
where
    K: Clone + Eq + std::hash::Hash,
    B: ExampleBuilder<K>,
{
    /// Creates a new cache which compares records by their **Eq** and **Hash** implementations.
    ///
    /// # Errors
    /// Fails with [PoolError::Config] if caching is enabled with a capacity of 0.
    pub fn new(builder: B, settings: CacheSettings) -> PoolResult<Self> {
        ExampleCache::with_policy(builder, settings, Structural)
    }
}

impl<K, B, P> ExampleCache<K, B, P>
where
    K: Clone,
    B: ExampleBuilder<K>,
    P: EqualityPolicy<K>,
{
    /// Creates a new cache which compares records using the given policy.
    ///
    /// # Errors
    /// Fails with [PoolError::Config] if caching is enabled with a capacity of 0.
    pub fn with_policy(builder: B, settings: CacheSettings, policy: P) -> PoolResult<Self> {
        settings.validate()?;

        let enabled = settings.is_enabled();
        let capacity = settings.max_size();
        let ledger = (enabled && settings.verification() == Verification::Strict)
            .then(BorrowLedger::default);

        if enabled {
            log::debug!(
                "Creating an example cache for up to {} examples (verification: {:?}).",
                capacity,
                settings.verification()
            );
        } else {
            log::debug!("Creating a pass-through example cache.");
        }

        Ok(ExampleCache {
            builder,
            policy,
            enabled,
            disposed: false,
            capacity,
            next_id: 1,
            entries: LinkedHashMap::with_capacity(if enabled { capacity + 1 } else { 0 }),
            index: FnvHashMap::default(),
            ledger,
            stats: CacheStats::default(),
        })
    }

    /// Requests the example for the given record.
    ///
    /// If caching is disabled or if a **label** is given, a fresh example is built and returned
    /// as [Lease::Detached]. Otherwise the cached example is returned or, if none is present,
    /// built, stored and returned as [Lease::Pooled]. Each pooled example has to be given back
    /// via [ExampleCache::give_back].
    ///
    /// # Errors
    /// * [PoolError::Build] if the builder failed. In this case the cache remains unchanged.
    /// * [PoolError::ProtocolViolation] if the example is still borrowed (strict mode only).
    /// * [PoolError::Disposed] if the cache has been shut down.
    pub fn request(&mut self, record: &K, label: Option<&str>) -> PoolResult<Lease<B::Example>> {
        self.ensure_active()?;
        self.stats.requests += 1;

        if !self.enabled || label.is_some() {
            self.stats.bypassed += 1;
            return self.build(record, label).map(Lease::Detached);
        }

        let hash = self.policy.hash_key(record);
        if let Some(id) = self.find(hash, record) {
            let verify = self.ledger.is_some();
            if let Some(entry) = self.entries.get_refresh(&id) {
                entry.touch();
                if verify {
                    if entry.is_in_use() {
                        return Err(PoolError::ProtocolViolation(
                            "The requested example is still borrowed and has to be given back first."
                                .to_owned(),
                        ));
                    }
                    entry.set_in_use(true);
                }

                self.stats.hits += 1;
                log::debug!("Serving cached example #{}.", id);
                return Ok(Lease::Pooled(entry.example().clone()));
            }
        }

        self.insert(record, hash)
    }

    /// Determines if an example for the given record is present.
    ///
    /// In contrast to [ExampleCache::request], this doesn't count as usage of the entry.
    pub fn contains(&self, record: &K) -> bool {
        self.enabled && !self.disposed && self.find(self.policy.hash_key(record), record).is_some()
    }

    fn find(&self, hash: u64, record: &K) -> Option<u64> {
        self.index.get(&hash)?.iter().copied().find(|id| {
            self.entries
                .get(id)
                .map_or(false, |entry| self.policy.equivalent(entry.key(), record))
        })
    }

    fn insert(&mut self, record: &K, hash: u64) -> PoolResult<Lease<B::Example>> {
        let example = Arc::new(self.build(record, None)?);
        self.stats.misses += 1;

        let id = self.next_id;
        self.next_id += 1;

        let mut entry = Entry::new(record.clone(), hash, example.clone());
        if let Some(ledger) = self.ledger.as_mut() {
            let registered = ledger.register(&example, id);
            debug_assert!(registered, "A fresh example must not be known to the ledger.");
            entry.set_in_use(true);
        }

        self.index.entry(hash).or_default().push(id);
        let _ = self.entries.insert(id, entry);
        log::debug!("Cached new example #{} ({} of {}).", id, self.entries.len(), self.capacity);

        self.enforce_capacity();

        Ok(Lease::Pooled(example))
    }
}

impl<K, B, P> ExampleCache<K, B, P>
where
    B: ExampleBuilder<K>,
{
    fn ensure_active(&self) -> PoolResult<()> {
        if self.disposed {
            Err(PoolError::Disposed)
        } else {
            Ok(())
        }
    }

    fn build(&mut self, record: &K, label: Option<&str>) -> PoolResult<B::Example> {
        self.builder.build(record, label).map_err(|error| {
            self.stats.build_failures += 1;
            log::debug!("Failed to build an example: {:#}", error);
            PoolError::Build(error)
        })
    }

    /// Gives back an example which has previously been obtained via
    /// [ExampleCache::request].
    ///
    /// If the cache holds more examples than permitted, the least recently used one is evicted.
    ///
    /// # Errors
    /// * [PoolError::ProtocolViolation] if caching is disabled or if the lease is
    ///   [Lease::Detached]. In strict mode also if the example isn't known to this cache (it
    ///   was built by another cache or has already been evicted) or if it isn't borrowed.
    /// * [PoolError::Disposed] if the cache has been shut down.
    ///
    /// In relaxed mode an example which isn't cached (anymore) is accepted but neither counted
    /// as return nor does it affect the cache.
    ///
    /// Note that the lease is consumed in any case. Therefore an example which cannot be given
    /// back is released once nobody else holds it.
    pub fn give_back(&mut self, lease: Lease<B::Example>) -> PoolResult<()> {
        self.ensure_active()?;

        if !self.enabled {
            return Err(PoolError::ProtocolViolation(
                "Caching is disabled, therefore no example can be given back.".to_owned(),
            ));
        }

        let example = match lease {
            Lease::Pooled(example) => example,
            Lease::Detached(_) => {
                return Err(PoolError::ProtocolViolation(
                    "A detached example is owned by the caller and cannot be given back."
                        .to_owned(),
                ))
            }
        };

        if let Some(ledger) = &self.ledger {
            let id = ledger.owner_of(&example).ok_or_else(|| {
                PoolError::ProtocolViolation(
                    "The given example is unknown to this cache or has already been evicted."
                        .to_owned(),
                )
            })?;

            match self.entries.get_mut(&id) {
                Some(entry) if entry.is_in_use() => entry.set_in_use(false),
                _ => {
                    return Err(PoolError::ProtocolViolation(
                        "The given example has already been given back.".to_owned(),
                    ))
                }
            }
        } else if !self.holds(&example) {
            log::debug!("Ignoring a returned example which isn't (or no longer) cached.");
            return Ok(());
        }

        self.stats.returns += 1;

        // Drop our handle first, so that an eviction below can release the example right away...
        drop(example);
        self.enforce_capacity();

        Ok(())
    }

    /// Determines if one of the entries owns the given example.
    fn holds(&self, example: &Arc<B::Example>) -> bool {
        self.entries
            .iter()
            .any(|(_, entry)| Arc::ptr_eq(entry.example(), example))
    }

    fn enforce_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            match self.entries.pop_front() {
                Some((id, entry)) => {
                    self.stats.evictions += 1;
                    log::debug!(
                        "Evicting example #{} which has been idle for {:?}.",
                        id,
                        entry.idle_time()
                    );
                    self.discard(id, entry);
                }
                None => break,
            }
        }

        debug_assert!(self
            .ledger
            .as_ref()
            .map_or(true, |ledger| ledger.len() == self.entries.len()));
    }

    /// Removes the given entry from all lookup structures and releases its example.
    fn discard(&mut self, id: u64, entry: Entry<K, B::Example>) {
        if let Some(ids) = self.index.get_mut(&entry.hash()) {
            ids.retain(|candidate| *candidate != id);
            if ids.is_empty() {
                let _ = self.index.remove(&entry.hash());
            }
        }

        if let Some(ledger) = self.ledger.as_mut() {
            ledger.forget(entry.example());
        }

        if entry.is_in_use() {
            log::warn!(
                "Example #{} is discarded while it is still borrowed. Giving it back will fail.",
                id
            );
        }

        if !entry.release() {
            log::debug!(
                "Example #{} is still referenced and will be released by its last borrower.",
                id
            );
        }
    }

    /// Releases all examples and returns the number of those still held by a borrower.
    fn release_all(&mut self) -> usize {
        self.index.clear();
        if let Some(ledger) = self.ledger.as_mut() {
            ledger.clear();
        }

        let mut outstanding = 0;
        while let Some((_, entry)) = self.entries.pop_front() {
            if !entry.release() {
                outstanding += 1;
            }
        }

        outstanding
    }

    /// Releases all cached examples but keeps the cache operational.
    ///
    /// Note that this will also reset all metrics.
    ///
    /// # Errors
    /// Fails with [PoolError::Disposed] if the cache has been shut down.
    pub fn flush(&mut self) -> PoolResult<()> {
        self.ensure_active()?;

        let outstanding = self.release_all();
        if outstanding > 0 {
            log::warn!(
                "Flushed the example cache while {} example(s) were still borrowed.",
                outstanding
            );
        }
        self.stats = CacheStats::default();

        Ok(())
    }

    /// Shuts the cache down and releases all examples.
    ///
    /// Examples which are still borrowed at this point are released once their borrower drops
    /// the lease. Calling this method again has no effect, but all other operations will fail
    /// with [PoolError::Disposed] from now on.
    ///
    /// Note that dropping a cache also shuts it down.
    pub fn shutdown(&mut self) {
        if self.disposed {
            return;
        }

        self.disposed = true;
        let cached = self.entries.len();
        let outstanding = self.release_all();

        if outstanding > 0 {
            log::warn!(
                "Shut down the example cache while {} of {} example(s) were still borrowed.",
                outstanding,
                cached
            );
        } else if self.enabled {
            log::debug!("Shut down the example cache and released {} example(s).", cached);
        }
    }

    /// Determines if this cache actually stores examples.
    ///
    /// This is **false** for a pass-through cache and for a cache which has been shut down.
    pub fn caches_examples(&self) -> bool {
        self.enabled && !self.disposed
    }

    /// Determines if the borrow / return protocol is verified.
    pub fn verifies_borrows(&self) -> bool {
        self.ledger.is_some()
    }

    /// Returns the number of cached examples.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Determines if the cache is completely empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of cached examples which are currently held by a borrower.
    pub fn borrowed(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_in_use() || entry.is_shared())
            .count()
    }

    /// Returns the overall capacity (max number of examples) of this cache.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the maximal number of examples permitted in this cache.
    ///
    /// If the cache currently holds more examples, the least recently used ones are evicted.
    ///
    /// # Errors
    /// * [PoolError::Config] if the given capacity is 0.
    /// * [PoolError::Disposed] if the cache has been shut down.
    pub fn set_capacity(&mut self, capacity: usize) -> PoolResult<()> {
        self.ensure_active()?;

        if capacity == 0 {
            return Err(PoolError::Config(
                "The maximal cache size must be at least 1.".to_owned(),
            ));
        }

        log::info!(
            "Changing the capacity of the example cache from {} to {}.",
            self.capacity,
            capacity
        );
        self.capacity = capacity;
        self.enforce_capacity();

        Ok(())
    }

    /// Returns the cache utilization in percent.
    pub fn utilization(&self) -> f32 {
        self.entries.len() as f32 / self.capacity as f32 * 100.
    }

    /// Returns the metrics recorded since the cache was created or flushed.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Verifies that the reverse index of the borrow ledger exactly matches the cached entries.
    ///
    /// This is always **true** if borrows aren't verified.
    pub fn verify_integrity(&self) -> bool {
        match &self.ledger {
            Some(ledger) => ledger.is_consistent_with(
                self.entries
                    .iter()
                    .map(|(id, entry)| (*id, entry.example())),
            ),
            None => true,
        }
    }
}

impl<K, B, P> Drop for ExampleCache<K, B, P>
where
    B: ExampleBuilder<K>,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}
