//! Provides a builder which sets up a record processing context.
//!
//! A context consists of the logging system, the cache settings and finally the
//! [ExampleCache] itself. Whether examples are actually cached depends on two things: the
//! settings have to enable caching and the record type has to opt in by implementing [Record]
//! with **CACHES_EXAMPLES** set to **true**. Record types which are cheap to convert or which
//! are rarely seen twice simply keep the default and receive a pass-through cache.
//!
//! # Example
//! ```
//! # use exemplar::builder::{ContextBuilder, Record};
//! # use exemplar::config::Config;
//! #[derive(Clone, PartialEq, Eq, Hash)]
//! struct Transaction {
//!     id: u64,
//!     amount: i64,
//! }
//!
//! impl Record for Transaction {
//!     const CACHES_EXAMPLES: bool = true;
//! }
//!
//! let config = Config::new("config/settings.yml");
//! config.load_from_string("
//! examples:
//!     enable_caching: true
//!     max_cache_size: 128
//! ", None).unwrap();
//!
//! let mut cache = ContextBuilder::new()
//!     .load_settings(&config)
//!     .unwrap()
//!     .build(|record: &Transaction, _label: Option<&str>| -> anyhow::Result<Vec<i64>> {
//!         Ok(vec![record.id as i64, record.amount])
//!     })
//!     .unwrap();
//!
//! assert_eq!(cache.caches_examples(), true);
//! assert_eq!(cache.capacity(), 128);
//!
//! let example = cache.request(&Transaction { id: 1, amount: 100 }, None).unwrap();
//! assert_eq!(*example, vec![1, 100]);
//! cache.give_back(example).unwrap();
//! ```
use std::hash::Hash;

use crate::config::Config;
use crate::equality::EqualityPolicy;
use crate::pool::{CacheSettings, ExampleBuilder, ExampleCache, Verification};
use crate::{init_logging, PoolResult, EXEMPLAR_VERSION};

/// Marks a type as record which can be converted into a native example.
///
/// By default records don't opt into caching. Types which are expensive to convert and which
/// are requested repeatedly should set **CACHES_EXAMPLES** to **true**.
pub trait Record {
    /// Determines if examples built for this record type may be cached.
    const CACHES_EXAMPLES: bool = false;
}

/// Establishes a record processing context by setting up logging and creating the cache.
///
/// # Example
/// Creating a context which caches up to 64 examples of strings:
/// ```
/// # use exemplar::builder::{ContextBuilder, Record};
/// # use exemplar::pool::CacheSettings;
/// #[derive(Clone, PartialEq, Eq, Hash)]
/// struct Sentence(String);
///
/// impl Record for Sentence {
///     const CACHES_EXAMPLES: bool = true;
/// }
///
/// let cache = ContextBuilder::new()
///     .enable_logging()
///     .with_settings(CacheSettings::enabled(64))
///     .build(|record: &Sentence, _label: Option<&str>| -> anyhow::Result<usize> {
///         Ok(record.0.split_whitespace().count())
///     })
///     .unwrap();
///
/// assert_eq!(cache.capacity(), 64);
/// ```
#[derive(Default)]
pub struct ContextBuilder {
    setup_logging: bool,
    settings: CacheSettings,
}

impl ContextBuilder {
    /// Creates a new builder.
    ///
    /// By default logging isn't touched and caching is disabled.
    pub fn new() -> Self {
        ContextBuilder {
            setup_logging: false,
            settings: CacheSettings::disabled(),
        }
    }

    /// Enables the automatic setup of the logging system.
    ///
    /// This initializes **simplelog** to log to stdout. See [init_logging].
    pub fn enable_logging(mut self) -> Self {
        self.setup_logging = true;
        self
    }

    /// Disables the automatic setup of the logging system.
    pub fn disable_logging(mut self) -> Self {
        self.setup_logging = false;
        self
    }

    /// Specifies the cache settings to use.
    pub fn with_settings(mut self, settings: CacheSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Reads the cache settings from the **examples** section of the given config.
    ///
    /// # Errors
    /// Fails with a [PoolError::Config](crate::PoolError::Config) if the section contains
    /// malformed values.
    pub fn load_settings(mut self, config: &Config) -> PoolResult<Self> {
        self.settings = CacheSettings::from_config(config)?;
        Ok(self)
    }

    /// Enables caching while keeping the configured capacity.
    pub fn enable_caching(mut self) -> Self {
        self.settings = CacheSettings::enabled(self.settings.max_size())
            .with_verification(self.settings.verification());
        self
    }

    /// Disables caching so that each request builds a fresh example.
    pub fn disable_caching(mut self) -> Self {
        self.settings = CacheSettings::disabled().with_verification(self.settings.verification());
        self
    }

    /// Specifies whether the borrow / return protocol is verified.
    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.settings = self.settings.with_verification(verification);
        self
    }

    /// Returns the settings which are currently used.
    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Creates a cache which compares records by their **Eq** and **Hash** implementations.
    ///
    /// # Errors
    /// Fails with a [PoolError::Config](crate::PoolError::Config) if caching is enabled with a
    /// capacity of 0.
    pub fn build<K, B>(self, builder: B) -> PoolResult<ExampleCache<K, B>>
    where
        K: Record + Clone + Eq + Hash,
        B: ExampleBuilder<K>,
    {
        let settings = self.setup::<K>();
        ExampleCache::new(builder, settings)
    }

    /// Creates a cache which compares records using the given policy.
    ///
    /// # Errors
    /// Fails with a [PoolError::Config](crate::PoolError::Config) if caching is enabled with a
    /// capacity of 0.
    pub fn build_with_policy<K, B, P>(
        self,
        builder: B,
        policy: P,
    ) -> PoolResult<ExampleCache<K, B, P>>
    where
        K: Record + Clone,
        B: ExampleBuilder<K>,
        P: EqualityPolicy<K>,
    {
        let settings = self.setup::<K>();
        ExampleCache::with_policy(builder, settings, policy)
    }

    fn setup<K: Record>(&self) -> CacheSettings {
        if self.setup_logging {
            init_logging();
        }

        log::info!(
            "||. EXEMPLAR (v {}) - Setting up a record processing context for {}...",
            EXEMPLAR_VERSION,
            std::any::type_name::<K>()
        );

        if self.settings.is_enabled() && !K::CACHES_EXAMPLES {
            log::debug!(
                "Caching is enabled but {} doesn't opt in - using a pass-through cache.",
                std::any::type_name::<K>()
            );
        }

        self.settings.restrict_to(K::CACHES_EXAMPLES)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{ContextBuilder, Record};
    use crate::config::Config;
    use crate::equality::ByKey;
    use crate::pool::{CacheSettings, Verification};
    use crate::PoolError;
    use std::io::Write;
    use std::time::{Duration, SystemTime};

    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Cached(u32);

    impl Record for Cached {
        const CACHES_EXAMPLES: bool = true;
    }

    #[derive(Clone, PartialEq, Eq, Hash)]
    struct Uncached(u32);

    impl Record for Uncached {}

    fn square_cached(record: &Cached, _label: Option<&str>) -> anyhow::Result<u64> {
        Ok(record.0 as u64 * record.0 as u64)
    }

    fn square_uncached(record: &Uncached, _label: Option<&str>) -> anyhow::Result<u64> {
        Ok(record.0 as u64 * record.0 as u64)
    }

    #[test]
    fn records_have_to_opt_in() {
        let cache = ContextBuilder::new()
            .with_settings(CacheSettings::enabled(8))
            .build(square_cached)
            .unwrap();
        assert_eq!(cache.caches_examples(), true);

        let mut cache = ContextBuilder::new()
            .with_settings(CacheSettings::enabled(8))
            .build(square_uncached)
            .unwrap();
        assert_eq!(cache.caches_examples(), false);

        let example = cache.request(&Uncached(3), None).unwrap();
        assert_eq!(example.is_pooled(), false);
        assert_eq!(*example, 9);
    }

    #[test]
    fn caching_is_disabled_by_default() {
        let cache = ContextBuilder::new().build(square_cached).unwrap();
        assert_eq!(cache.caches_examples(), false);

        let cache = ContextBuilder::new()
            .enable_caching()
            .with_verification(Verification::Relaxed)
            .build(square_cached)
            .unwrap();
        assert_eq!(cache.caches_examples(), true);
        assert_eq!(cache.verifies_borrows(), false);
    }

    #[test]
    fn settings_are_loaded_from_the_config() {
        let config = Config::new("test.yml");
        config
            .load_from_string(
                "
examples:
    enable_caching: true
    max_cache_size: 3
    verify_borrows: true
",
                None,
            )
            .unwrap();

        let builder = ContextBuilder::new().load_settings(&config).unwrap();
        assert_eq!(builder.settings().max_size(), 3);

        let cache = builder.disable_logging().build(square_cached).unwrap();
        assert_eq!(cache.capacity(), 3);
        assert_eq!(cache.verifies_borrows(), true);

        config
            .load_from_string("examples:\n    max_cache_size: zero", None)
            .unwrap();
        assert!(matches!(
            ContextBuilder::new().load_settings(&config),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn contexts_pick_up_reloaded_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "examples:\n    enable_caching: true\n    max_cache_size: 3").unwrap();

        let config = Config::new(file.path().to_str().unwrap());
        assert_eq!(config.reload_if_changed().unwrap(), true);
        let cache = ContextBuilder::new()
            .load_settings(&config)
            .unwrap()
            .build(square_cached)
            .unwrap();
        assert_eq!(cache.capacity(), 3);

        // Rewrite the file and make sure it is considered newer than the loaded one...
        file.as_file().set_len(0).unwrap();
        let mut rewritten = file.reopen().unwrap();
        writeln!(rewritten, "examples:\n    enable_caching: true\n    max_cache_size: 5").unwrap();
        file.as_file()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();

        assert_eq!(config.reload_if_changed().unwrap(), true);
        let cache = ContextBuilder::new()
            .load_settings(&config)
            .unwrap()
            .build(square_cached)
            .unwrap();
        assert_eq!(cache.capacity(), 5);
    }

    #[test]
    fn custom_policies_can_be_used() {
        let mut cache = ContextBuilder::new()
            .with_settings(CacheSettings::enabled(2))
            .disable_caching()
            .enable_caching()
            .build_with_policy(square_cached, ByKey::new(|record: &Cached| record.0 % 10))
            .unwrap();

        let example = cache.request(&Cached(12), None).unwrap();
        cache.give_back(example).unwrap();

        // 22 maps to the same key as 12, therefore the cached example is returned...
        let example = cache.request(&Cached(22), None).unwrap();
        assert_eq!(*example, 144);
        cache.give_back(example).unwrap();
        assert_eq!(cache.stats().hits(), 1);
    }
}
