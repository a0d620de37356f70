//! Provides a size constrained pool of native examples.
//!
//! Converting a record into the representation of a native engine (an **example**) is
//! expensive. Therefore the [ExampleCache] keeps recently built examples around and hands them
//! out again once the same record is requested. Whether two records are "the same" is decided by
//! an [EqualityPolicy](crate::equality::EqualityPolicy).
//!
//! The cache is bounded: once it is about to grow beyond its capacity, the least recently used
//! example is evicted and released. As native examples can only be used by one caller at a time,
//! requesting an example borrows it and the caller has to give it back once done. In strict mode
//! (see [Verification]) the cache tracks all borrows and reports misuse, like requesting an
//! example which is still borrowed or giving back an example twice, as
//! [PoolError::ProtocolViolation](crate::PoolError::ProtocolViolation).
//!
//! Requests with a label always bypass the cache, as do all requests if caching is disabled. The
//! resulting examples are [Lease::Detached] and simply dropped by the caller.
//!
//! The [ExampleCache] itself performs no locking. Use a [SharedExampleCache] to share a cache
//! between threads.
mod entry;
mod example_cache;
mod lease;
mod ledger;
mod settings;
mod shared;

pub use example_cache::{CacheStats, ExampleBuilder, ExampleCache};
pub use lease::Lease;
pub use ledger::Verification;
pub use settings::{CacheSettings, DEFAULT_MAX_CACHE_SIZE};
pub use shared::SharedExampleCache;
