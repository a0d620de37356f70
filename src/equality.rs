//! Provides the policies which decide whether two records address the same cache entry.
//!
//! By default records are compared structurally, i.e. via their own **Eq** and **Hash**
//! implementations (see [Structural]). Some record types however carry data which should not
//! take part in the comparison (e.g. a timestamp of when the record was loaded) or are shared
//! handles where only the identity matters. For these cases a different policy can be passed
//! to [ExampleCache::with_policy](crate::pool::ExampleCache::with_policy).
//!
//! A policy must be implemented for the exact record type of the cache. As this is checked by
//! the compiler, a cache can never be constructed with a policy which doesn't fit its records.
//!
//! # Examples
//!
//! Comparing records by a projected key:
//! ```
//! # use exemplar::equality::{ByKey, EqualityPolicy};
//! struct Observation {
//!     id: u64,
//!     loaded_at: u64,
//! }
//!
//! let policy = ByKey::new(|observation: &Observation| observation.id);
//! let first = Observation { id: 1, loaded_at: 100 };
//! let second = Observation { id: 1, loaded_at: 200 };
//!
//! assert_eq!(policy.equivalent(&first, &second), true);
//! assert_eq!(policy.hash_key(&first), policy.hash_key(&second));
//! ```
use fnv::FnvHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

/// Compares records for cache-key equivalence and hashes them consistently.
///
/// Implementations have to ensure that two equivalent records yield the same hash.
pub trait EqualityPolicy<K: ?Sized> {
    /// Determines if both records address the same cache entry.
    fn equivalent(&self, left: &K, right: &K) -> bool;

    /// Computes the hash of the given record.
    fn hash_key(&self, key: &K) -> u64;
}

fn fnv_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = FnvHasher::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Compares records using their own **Eq** and **Hash** implementations.
#[derive(Copy, Clone, Debug, Default)]
pub struct Structural;

impl<K: Eq + Hash + ?Sized> EqualityPolicy<K> for Structural {
    fn equivalent(&self, left: &K, right: &K) -> bool {
        left == right
    }

    fn hash_key(&self, key: &K) -> u64 {
        fnv_hash(key)
    }
}

/// Compares shared records by identity.
///
/// Two handles are considered equal if they point to the same allocation, no matter what the
/// contents look like.
///
/// # Examples
/// ```
/// # use exemplar::equality::{ByIdentity, EqualityPolicy};
/// # use std::sync::Arc;
/// let record = Arc::new("record".to_owned());
/// let copy = Arc::new("record".to_owned());
///
/// assert_eq!(ByIdentity.equivalent(&record, &record.clone()), true);
/// assert_eq!(ByIdentity.equivalent(&record, &copy), false);
/// ```
#[derive(Copy, Clone, Debug, Default)]
pub struct ByIdentity;

impl<T: ?Sized> EqualityPolicy<Arc<T>> for ByIdentity {
    fn equivalent(&self, left: &Arc<T>, right: &Arc<T>) -> bool {
        Arc::ptr_eq(left, right)
    }

    fn hash_key(&self, key: &Arc<T>) -> u64 {
        fnv_hash(&(Arc::as_ptr(key) as *const () as usize))
    }
}

impl<T: ?Sized> EqualityPolicy<Rc<T>> for ByIdentity {
    fn equivalent(&self, left: &Rc<T>, right: &Rc<T>) -> bool {
        Rc::ptr_eq(left, right)
    }

    fn hash_key(&self, key: &Rc<T>) -> u64 {
        fnv_hash(&(Rc::as_ptr(key) as *const () as usize))
    }
}

/// Compares records by a key derived from each record.
///
/// This is handy if only a part of a record determines the example built for it.
pub struct ByKey<F> {
    extractor: F,
}

impl<F> ByKey<F> {
    /// Creates a policy which compares the keys computed by **extractor**.
    pub fn new(extractor: F) -> Self {
        ByKey { extractor }
    }
}

impl<K, Q, F> EqualityPolicy<K> for ByKey<F>
where
    K: ?Sized,
    Q: Eq + Hash,
    F: Fn(&K) -> Q,
{
    fn equivalent(&self, left: &K, right: &K) -> bool {
        (self.extractor)(left) == (self.extractor)(right)
    }

    fn hash_key(&self, key: &K) -> u64 {
        fnv_hash(&(self.extractor)(key))
    }
}

impl<K: ?Sized, P: EqualityPolicy<K> + ?Sized> EqualityPolicy<K> for Box<P> {
    fn equivalent(&self, left: &K, right: &K) -> bool {
        (**self).equivalent(left, right)
    }

    fn hash_key(&self, key: &K) -> u64 {
        (**self).hash_key(key)
    }
}

#[cfg(test)]
mod tests {
    use crate::equality::{ByIdentity, ByKey, EqualityPolicy, Structural};
    use std::rc::Rc;
    use std::sync::Arc;

    #[test]
    fn structural_policy_uses_eq_and_hash() {
        let a = "record".to_owned();
        let b = "record".to_owned();
        let c = "other".to_owned();

        assert_eq!(Structural.equivalent(&a, &b), true);
        assert_eq!(Structural.hash_key(&a), Structural.hash_key(&b));
        assert_eq!(Structural.equivalent(&a, &c), false);
    }

    #[test]
    fn identity_policy_ignores_contents() {
        let a = Rc::new(42);
        let b = Rc::new(42);

        assert_eq!(ByIdentity.equivalent(&a, &a.clone()), true);
        assert_eq!(ByIdentity.hash_key(&a), ByIdentity.hash_key(&a.clone()));
        assert_eq!(ByIdentity.equivalent(&a, &b), false);

        let x = Arc::new("x");
        assert_eq!(ByIdentity.equivalent(&x, &Arc::new("x")), false);
    }

    struct Record {
        id: u32,
        payload: String,
    }

    fn record(id: u32, payload: &str) -> Record {
        Record {
            id,
            payload: payload.to_owned(),
        }
    }

    #[test]
    fn key_policy_only_compares_the_projection() {
        let policy = ByKey::new(|record: &Record| record.id);

        let a = record(1, "a");
        let b = record(1, "b");
        assert_ne!(a.payload, b.payload);
        assert_eq!(policy.equivalent(&a, &b), true);
        assert_eq!(policy.hash_key(&a), policy.hash_key(&b));
        assert_eq!(policy.equivalent(&a, &record(2, "a")), false);
    }

    #[test]
    fn boxed_policies_delegate() {
        let policy: Box<dyn EqualityPolicy<String>> = Box::new(Structural);
        assert_eq!(policy.equivalent(&"a".to_owned(), &"a".to_owned()), true);
    }
}
