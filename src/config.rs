//! Contains the system configuration.
//!
//! Provides access to the system configuration which is commonly loaded from
//! **config/settings.yml**. The settings which are relevant for the example pool live in the
//! **examples** object:
//!
//! ```yaml
//! examples:
//!     # Enables the example cache for all record types which opt into caching.
//!     enable_caching: true
//!     # Specifies the maximal number of examples to keep.
//!     max_cache_size: 1024
//!     # Determines if the borrow / return protocol is verified. Defaults to true in
//!     # debug builds and to false in release builds.
//!     verify_borrows: true
//! ```
//!
//! Note that the **Config** struct is kind of constant and can be created once and then kept
//! around. A [Handle] obtained via [Config::current] however should not be stored, as it will
//! not be updated once a new config has been loaded.
//!
//! # Examples
//!
//! ```
//! # use exemplar::config::Config;
//! let config = Config::new("config/settings.yml");
//! config.load_from_string("
//! examples:
//!     max_cache_size: 256
//! ", None).unwrap();
//!
//! let size = config.current().query("examples.max_cache_size").as_i64().unwrap_or(1024);
//! assert_eq!(size, 256);
//! ```
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use arc_swap::ArcSwap;
use yaml_rust::{Yaml, YamlLoader};

/// Provides access to the system configuration.
///
/// The currently loaded document is kept in an **ArcSwap** so that re-loading the config
/// atomically replaces it while readers keep using the snapshot they obtained.
pub struct Config {
    filename: String,
    config: ArcSwap<(Yaml, Option<SystemTime>)>,
}

/// Represents a handle to the currently loaded configuration.
///
/// Note that this handle should not be stored or kept around for long, as it will not be updated
/// if the underlying config changed.
pub struct Handle {
    config: Arc<(Yaml, Option<SystemTime>)>,
}

impl Config {
    /// Creates a new config reading the given file.
    ///
    /// Note that this will not read the file. Use [Config::load] to do so.
    pub fn new(file: &str) -> Self {
        Config {
            filename: file.to_owned(),
            config: ArcSwap::new(Arc::new((Yaml::Null, None))),
        }
    }

    /// Returns the name of the file this config is read from.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Obtains a handle to the currently loaded configuration.
    pub fn current(&self) -> Handle {
        Handle {
            config: self.config.load_full(),
        }
    }

    /// Determines the last modified date of the config file on disk.
    ///
    /// Within docker, the file is presented as volume. Therefore we check that it is a file, as
    /// an unmounted docker volume is always presented as directory.
    pub fn last_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.filename)
            .ok()
            .filter(|meta| meta.is_file())
            .and_then(|meta| meta.modified().ok())
    }

    /// Reads the underlying file.
    ///
    /// If the path exists but isn't a file, loading is skipped and the previous config remains
    /// active.
    pub fn load(&self) -> anyhow::Result<()> {
        log::info!("Loading config file {}...", &self.filename);

        if let Ok(metadata) = std::fs::metadata(&self.filename) {
            if !metadata.is_file() {
                log::info!("Config file doesn't exist or is an unmounted docker volume - skipping config load.");
                return Ok(());
            }
        }

        let config_data = std::fs::read_to_string(&self.filename)
            .with_context(|| format!("Cannot load config file {}", &self.filename))?;

        self.load_from_string(config_data.as_str(), self.last_modified())
    }

    /// Re-loads the config if the file on disk is newer than the one previously loaded.
    ///
    /// Returns **true** if a new config has been loaded. Note that a malformed file is reported
    /// as error and leaves the current config untouched.
    ///
    /// Caches read their settings once when they are created. Therefore this is intended for
    /// callers which periodically check their config and then rebuild their processing context
    /// via [ContextBuilder::load_settings](crate::builder::ContextBuilder::load_settings).
    pub fn reload_if_changed(&self) -> anyhow::Result<bool> {
        // This will contain the last modified date of the file on disk or be None if the
        // file is absent...
        let last_modified = self.last_modified();

        // Contains the timestamp when the file was loaded the last time or be None if no
        // data has been loaded yet...
        let last_loaded = self.config.load().1;

        if last_modified.is_some() && (last_loaded.is_none() || last_modified > last_loaded) {
            self.load()?;
            log::info!("System configuration was re-loaded.");
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Loads a configuration from the given string instead of a file.
    ///
    /// This is intended to be used in test environments where we cannot / do not want to load
    /// a config file from disk.
    ///
    /// # Example
    ///
    /// ```
    /// # use exemplar::config::Config;
    /// let config = Config::new("somefile.yml");
    /// config.load_from_string("
    /// examples:
    ///     enable_caching: true
    /// ", None).unwrap();
    ///
    /// assert_eq!(config.current().query("examples.enable_caching").as_bool(), Some(true));
    ///
    /// // A malformed config is rejected and the previous one remains active...
    /// assert_eq!(config.load_from_string("examples: 'invalid", None).is_err(), true);
    /// assert_eq!(config.current().query("examples.enable_caching").as_bool(), Some(true));
    /// ```
    pub fn load_from_string(
        &self,
        data: &str,
        last_modified: Option<SystemTime>,
    ) -> anyhow::Result<()> {
        let docs = match YamlLoader::load_from_str(data) {
            Ok(docs) => docs,
            Err(error) => {
                return Err(anyhow::anyhow!(
                    "Cannot parse config file {}: {}",
                    &self.filename,
                    error
                ));
            }
        };

        let doc = match docs.into_iter().next() {
            Some(doc @ Yaml::Hash(_)) => doc,
            _ => Yaml::Null,
        };

        self.config.store(Arc::new((doc, last_modified)));

        Ok(())
    }
}

impl Handle {
    /// Provides access to the currently loaded configuration.
    pub fn config(&self) -> &Yaml {
        &self.config.0
    }

    /// Returns the modification timestamp of the file this config was loaded from.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.config.1
    }

    /// Resolves a dotted path like **examples.max_cache_size** within the configuration.
    ///
    /// Yields **Yaml::BadValue** if any part of the path is missing.
    pub fn query(&self, path: impl AsRef<str>) -> &Yaml {
        path.as_ref()
            .split('.')
            .fold(self.config(), |node, key| &node[key])
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use std::io::Write;
    use std::time::{Duration, SystemTime};
    use yaml_rust::Yaml;

    #[test]
    fn queries_resolve_nested_paths() {
        let config = Config::new("test.yml");
        config
            .load_from_string(
                "
examples:
    enable_caching: true
    max_cache_size: 42
",
                None,
            )
            .unwrap();

        let handle = config.current();
        assert_eq!(handle.query("examples.enable_caching").as_bool(), Some(true));
        assert_eq!(handle.query("examples.max_cache_size").as_i64(), Some(42));
        assert_eq!(handle.query("examples.unknown").is_badvalue(), true);
        assert_eq!(handle.query("unknown.max_cache_size").is_badvalue(), true);
    }

    #[test]
    fn non_object_documents_are_treated_as_empty() {
        let config = Config::new("test.yml");
        config.load_from_string("- a\n- b", None).unwrap();
        assert_eq!(config.current().config(), &Yaml::Null);
        assert_eq!(config.current().query("examples").is_badvalue(), true);
    }

    #[test]
    fn handles_keep_their_snapshot() {
        let config = Config::new("test.yml");
        config.load_from_string("size: 1", None).unwrap();
        let old_handle = config.current();

        config.load_from_string("size: 2", None).unwrap();
        assert_eq!(old_handle.query("size").as_i64(), Some(1));
        assert_eq!(config.current().query("size").as_i64(), Some(2));
    }

    #[test]
    fn config_files_are_loaded_and_reloaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "examples:\n    max_cache_size: 8").unwrap();

        let config = Config::new(file.path().to_str().unwrap());
        assert_eq!(config.reload_if_changed().unwrap(), true);
        assert_eq!(
            config.current().query("examples.max_cache_size").as_i64(),
            Some(8)
        );
        assert_eq!(config.current().last_modified().is_some(), true);

        // Nothing changed on disk, so nothing is re-loaded...
        assert_eq!(config.reload_if_changed().unwrap(), false);

        // Pretend that the file has been loaded long ago, so that it is considered modified...
        config
            .load_from_string(
                "examples:\n    max_cache_size: 1",
                Some(SystemTime::UNIX_EPOCH + Duration::from_secs(1)),
            )
            .unwrap();
        assert_eq!(config.reload_if_changed().unwrap(), true);
        assert_eq!(
            config.current().query("examples.max_cache_size").as_i64(),
            Some(8)
        );
    }

    #[test]
    fn missing_files_are_reported() {
        let config = Config::new("/this/file/does/not/exist.yml");
        assert_eq!(config.load().is_err(), true);
        assert_eq!(config.reload_if_changed().unwrap(), false);
    }
}
