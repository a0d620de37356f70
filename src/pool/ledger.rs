//! Provides the optional verification layer of the example cache.
//!
//! The ledger maps the identity (address) of each pooled example to the entry owning it. This
//! permits to trace a returned example back to its entry and therefore to detect examples which
//! are returned twice, which were never handed out by this cache or which have already been
//! evicted.
//!
//! Maintaining this reverse index costs a hash map operation per request and return. Therefore
//! it is only enabled in [Verification::Strict] mode.
use fnv::FnvHashMap;
use std::sync::Arc;

/// Determines if the borrow / return protocol of a cache is verified.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verification {
    /// Every request and return is checked against a reverse index. Violations are reported as
    /// [ProtocolViolation](crate::PoolError::ProtocolViolation).
    Strict,

    /// No checks are performed. A double borrow hands out the same example twice and an unknown
    /// example which is given back is simply dropped. Following the protocol is solely up to the
    /// caller.
    Relaxed,
}

impl Default for Verification {
    /// Verifies borrows in debug builds and skips the checks in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Verification::Strict
        } else {
            Verification::Relaxed
        }
    }
}

/// Keeps track of which entry owns which example.
#[derive(Default)]
pub(crate) struct BorrowLedger {
    owners: FnvHashMap<usize, u64>,
}

fn address<V>(example: &Arc<V>) -> usize {
    Arc::as_ptr(example) as usize
}

impl BorrowLedger {
    /// Records that **example** is owned by the entry with the given id.
    ///
    /// Returns **false** if the example was already known, which would mean that an example
    /// is owned by two entries at once.
    pub fn register<V>(&mut self, example: &Arc<V>, entry_id: u64) -> bool {
        self.owners.insert(address(example), entry_id).is_none()
    }

    /// Removes the given example once its entry is gone.
    pub fn forget<V>(&mut self, example: &Arc<V>) {
        let _ = self.owners.remove(&address(example));
    }

    /// Determines the id of the entry which owns the given example.
    pub fn owner_of<V>(&self, example: &Arc<V>) -> Option<u64> {
        self.owners.get(&address(example)).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }

    /// Verifies that the ledger and the forward map of the cache correspond exactly.
    ///
    /// **entries** yields the id and example of each entry in the cache.
    pub fn is_consistent_with<'a, V: 'a>(
        &self,
        entries: impl Iterator<Item = (u64, &'a Arc<V>)>,
    ) -> bool {
        let mut count = 0;
        for (id, example) in entries {
            if self.owner_of(example) != Some(id) {
                return false;
            }
            count += 1;
        }

        count == self.owners.len()
    }
}
