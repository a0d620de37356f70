use yaml_rust::Yaml;

use crate::config::Config;
use crate::pool::Verification;
use crate::{PoolError, PoolResult};

/// The capacity used if caching is enabled but no **max_cache_size** is configured.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 1024;

/// Contains the settings of an [ExampleCache](crate::pool::ExampleCache).
///
/// These are read once when a cache is created. See [crate::config] for the layout of the
/// corresponding config section.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    enabled: bool,
    max_size: usize,
    verification: Verification,
}

impl CacheSettings {
    /// Creates settings for a cache which stores up to **max_size** examples.
    pub fn enabled(max_size: usize) -> Self {
        CacheSettings {
            enabled: true,
            max_size,
            verification: Verification::default(),
        }
    }

    /// Creates settings for a pass-through cache which builds a fresh example for each request.
    pub fn disabled() -> Self {
        CacheSettings {
            enabled: false,
            max_size: DEFAULT_MAX_CACHE_SIZE,
            verification: Verification::default(),
        }
    }

    /// Specifies whether the borrow / return protocol is verified.
    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.verification = verification;
        self
    }

    /// Reads the settings from the **examples** section of the given config.
    ///
    /// Missing values fall back to their defaults: caching is disabled, the capacity is
    /// [DEFAULT_MAX_CACHE_SIZE] and the protocol is verified in debug builds only.
    ///
    /// # Errors
    /// Fails with a [PoolError::Config] if a value is present but malformed.
    ///
    /// # Examples
    /// ```
    /// # use exemplar::config::Config;
    /// # use exemplar::pool::{CacheSettings, Verification};
    /// let config = Config::new("settings.yml");
    /// config.load_from_string("
    /// examples:
    ///     enable_caching: true
    ///     max_cache_size: 64
    ///     verify_borrows: false
    /// ", None).unwrap();
    ///
    /// let settings = CacheSettings::from_config(&config).unwrap();
    /// assert_eq!(settings.is_enabled(), true);
    /// assert_eq!(settings.max_size(), 64);
    /// assert_eq!(settings.verification(), Verification::Relaxed);
    /// ```
    pub fn from_config(config: &Config) -> PoolResult<Self> {
        let handle = config.current();

        let enabled = match handle.query("examples.enable_caching") {
            Yaml::Boolean(enabled) => *enabled,
            Yaml::BadValue | Yaml::Null => false,
            other => {
                return Err(PoolError::Config(format!(
                    "'examples.enable_caching' must be a boolean but is {:?}",
                    other
                )))
            }
        };

        let max_size = match handle.query("examples.max_cache_size") {
            Yaml::Integer(size) if *size > 0 => *size as usize,
            Yaml::BadValue | Yaml::Null => DEFAULT_MAX_CACHE_SIZE,
            other => {
                return Err(PoolError::Config(format!(
                    "'examples.max_cache_size' must be a positive integer but is {:?}",
                    other
                )))
            }
        };

        let verification = match handle.query("examples.verify_borrows") {
            Yaml::Boolean(true) => Verification::Strict,
            Yaml::Boolean(false) => Verification::Relaxed,
            Yaml::BadValue | Yaml::Null => Verification::default(),
            other => {
                return Err(PoolError::Config(format!(
                    "'examples.verify_borrows' must be a boolean but is {:?}",
                    other
                )))
            }
        };

        Ok(CacheSettings {
            enabled,
            max_size,
            verification,
        })
    }

    /// Determines if caching is enabled at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the maximal number of examples to keep.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Returns the verification mode to use.
    pub fn verification(&self) -> Verification {
        self.verification
    }

    /// Disables caching if the record type hasn't opted in.
    pub(crate) fn restrict_to(mut self, record_opts_in: bool) -> Self {
        self.enabled &= record_opts_in;
        self
    }

    /// Ensures that the settings describe a usable cache.
    pub(crate) fn validate(&self) -> PoolResult<()> {
        if self.enabled && self.max_size == 0 {
            Err(PoolError::Config(
                "The maximal cache size must be at least 1.".to_owned(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings::disabled()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::pool::{CacheSettings, Verification, DEFAULT_MAX_CACHE_SIZE};
    use crate::PoolError;

    fn parse(yaml: &str) -> Result<CacheSettings, PoolError> {
        let config = Config::new("test.yml");
        config.load_from_string(yaml, None).unwrap();
        CacheSettings::from_config(&config)
    }

    #[test]
    fn missing_values_fall_back_to_defaults() {
        let settings = parse("other: 1").unwrap();
        assert_eq!(settings.is_enabled(), false);
        assert_eq!(settings.max_size(), DEFAULT_MAX_CACHE_SIZE);
        assert_eq!(settings.verification(), Verification::default());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(matches!(
            parse("examples:\n    max_cache_size: 0"),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            parse("examples:\n    max_cache_size: -5"),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            parse("examples:\n    max_cache_size: many"),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            parse("examples:\n    enable_caching: 'yes please'"),
            Err(PoolError::Config(_))
        ));
        assert!(matches!(
            parse("examples:\n    verify_borrows: 1"),
            Err(PoolError::Config(_))
        ));
    }

    #[test]
    fn zero_capacity_is_only_invalid_when_caching() {
        let enabled = CacheSettings::enabled(0);
        assert_eq!(enabled.validate().is_err(), true);

        let disabled = CacheSettings::enabled(0).restrict_to(false);
        assert_eq!(disabled.is_enabled(), false);
        assert_eq!(disabled.validate().is_ok(), true);
    }
}
