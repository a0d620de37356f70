use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Represents an example handed out by [ExampleCache::request](crate::pool::ExampleCache::request).
///
/// A lease makes the ownership of the example explicit:
/// * **Pooled** examples are owned by the cache. The caller only borrows them and has to give
///   them back via [ExampleCache::give_back](crate::pool::ExampleCache::give_back) once done.
///   After giving it back, the same example might be handed out to the next caller requesting
///   the same record.
/// * **Detached** examples have been built for this caller only (caching is disabled or a label
///   was given). The caller owns them and releases them simply by dropping the lease.
///
/// Either way, a lease dereferences to the example itself.
pub enum Lease<V> {
    /// An example borrowed from the cache.
    Pooled(Arc<V>),

    /// An example owned by the caller.
    Detached(V),
}

impl<V> Lease<V> {
    /// Determines if this example is borrowed from the cache and has to be given back.
    pub fn is_pooled(&self) -> bool {
        matches!(self, Lease::Pooled(_))
    }

    /// Determines if both leases refer to the very same example.
    pub fn is_same_example(&self, other: &Lease<V>) -> bool {
        std::ptr::eq(self.deref(), other.deref())
    }
}

impl<V> Deref for Lease<V> {
    type Target = V;

    fn deref(&self) -> &V {
        match self {
            Lease::Pooled(example) => &**example,
            Lease::Detached(example) => example,
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Lease<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lease::Pooled(example) => write!(f, "Pooled({:?})", example),
            Lease::Detached(example) => write!(f, "Detached({:?})", example),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::Lease;
    use std::sync::Arc;

    #[test]
    fn leases_deref_to_their_example() {
        let pooled = Lease::Pooled(Arc::new(vec![1, 2, 3]));
        let detached = Lease::Detached(vec![1, 2, 3]);

        assert_eq!(pooled.len(), 3);
        assert_eq!(*pooled, *detached);
        assert_eq!(pooled.is_pooled(), true);
        assert_eq!(detached.is_pooled(), false);
        assert_eq!(pooled.is_same_example(&detached), false);
    }

    #[test]
    fn shared_examples_are_the_same() {
        let example = Arc::new("example");
        let first = Lease::Pooled(example.clone());
        let second = Lease::Pooled(example);

        assert_eq!(first.is_same_example(&second), true);
        assert_eq!(format!("{:?}", first), "Pooled(\"example\")");
    }
}
