#[cfg(test)]
use mock_instant::Instant;
#[cfg(not(test))]
use std::time::Instant;

use std::sync::Arc;
use std::time::Duration;

/// Keeps a single native example along with the bookkeeping required by the cache.
///
/// The entry is the owner of the example. Borrowers only ever hold an additional handle to it,
/// which they give back once they're done.
pub(crate) struct Entry<K, V> {
    key: K,
    hash: u64,
    example: Arc<V>,
    last_used: Instant,
    in_use: bool,
}

impl<K, V> Entry<K, V> {
    /// Wraps a freshly built example which is considered used right now.
    pub fn new(key: K, hash: u64, example: Arc<V>) -> Self {
        Entry {
            key,
            hash,
            example,
            last_used: Instant::now(),
            in_use: false,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn hash(&self) -> u64 {
        self.hash
    }

    pub fn example(&self) -> &Arc<V> {
        &self.example
    }

    /// Records an access to this entry.
    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    #[cfg(test)]
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Returns the time elapsed since the last access.
    pub fn idle_time(&self) -> Duration {
        Instant::now() - self.last_used
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    pub fn set_in_use(&mut self, in_use: bool) {
        self.in_use = in_use;
    }

    /// Determines if a borrower still holds a handle to the example.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.example) > 1
    }

    /// Drops the entry and with it the native example.
    ///
    /// Returns **true** if the example was freed right away or **false** if a borrower still
    /// holds a handle to it. In the latter case the example is freed once the last handle is
    /// dropped.
    pub fn release(self) -> bool {
        match Arc::try_unwrap(self.example) {
            Ok(example) => {
                drop(example);
                true
            }
            Err(_) => false,
        }
    }
}
