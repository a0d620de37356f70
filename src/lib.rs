//! Exemplar converts typed application records into the input representation of a native
//! computation engine and keeps the converted objects around for reuse.
//!
//! # Introduction
//! Building the native representation of a record (an **example**) is expensive: the engine
//! allocates memory outside of Rust, copies all fields over and often performs some validation.
//! Workloads like replay or training loops re-serialize the same logical record again and again,
//! therefore it pays off to keep recently built examples and hand them out again.
//!
//! This crate provides exactly that: a bounded, key-addressed pool of examples with
//! least-recently-used eviction and a strict borrow / return protocol. The conversion itself
//! is supplied by the caller as an [ExampleBuilder](pool::ExampleBuilder).
//!
//! # Modules
//! * **Pool**: The [ExampleCache](pool::ExampleCache) and its synchronized sibling
//!   [SharedExampleCache](pool::SharedExampleCache). See [crate::pool].
//! * **Equality**: Policies which decide whether two records address the same cache entry.
//!   See [crate::equality].
//! * **Config**: A YAML backed system configuration which provides the cache settings.
//!   See [crate::config].
//! * **Builder**: Sets up a record processing context (logging, settings, the cache itself).
//!   See [crate::builder].
//!
//! # Example
//! ```
//! # use exemplar::pool::{CacheSettings, ExampleCache};
//! // Our "native" example is simply a vector of features here...
//! let builder = |record: &u32, _label: Option<&str>| -> anyhow::Result<Vec<f32>> {
//!     Ok(vec![*record as f32; 4])
//! };
//!
//! let mut cache = ExampleCache::new(builder, CacheSettings::enabled(16)).unwrap();
//!
//! // The first request builds the example...
//! let example = cache.request(&42, None).unwrap();
//! assert_eq!(example[0], 42.);
//! cache.give_back(example).unwrap();
//!
//! // ...the second one is served from the cache.
//! let example = cache.request(&42, None).unwrap();
//! assert_eq!(cache.stats().hits(), 1);
//! cache.give_back(example).unwrap();
//!
//! cache.shutdown();
//! ```
#![deny(
    warnings,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod builder;
pub mod config;
pub mod equality;
pub mod error;
pub mod pool;

pub use error::{PoolError, PoolResult};

/// Contains the version of the Exemplar library.
pub const EXEMPLAR_VERSION: &str = "DEVELOPMENT-SNAPSHOT";

/// Initializes the logging system.
///
/// Note that most probably the simplest way is to use a [ContextBuilder](builder::ContextBuilder)
/// which will also set up logging if enabled.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // Tests and multiple contexts may all ask for logging, but the logger can only be
    // installed once...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            eprintln!("Failed to initialize logging system: {}", error);
        }
    });
}
