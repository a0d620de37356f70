//! Defines the errors reported by the example pool.
//!
//! The pool distinguishes between errors caused by the data being processed (a record which
//! cannot be converted, an invalid setting) and errors caused by misusing the API (returning an
//! example twice, using a cache after it has been shut down). The latter are reported as
//! [PoolError::ProtocolViolation] or [PoolError::Disposed] and can be detected via
//! [PoolError::is_misuse].

/// Enumerates all errors which can be reported by an [ExampleCache](crate::pool::ExampleCache).
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The settings used to construct or resize a cache are invalid.
    #[error("Invalid example cache configuration: {0}")]
    Config(String),

    /// The example builder failed for a record.
    ///
    /// This is reported transparently, so that the message is the one of the underlying cause.
    #[error(transparent)]
    Build(anyhow::Error),

    /// The borrow / return protocol has been violated by the caller.
    #[error("Example pool protocol violation: {0}")]
    ProtocolViolation(String),

    /// The cache has already been shut down.
    #[error("The example cache has already been shut down")]
    Disposed,
}

impl PoolError {
    /// Determines if this error signals a programming error rather than a problem with the
    /// processed data.
    ///
    /// # Examples
    /// ```
    /// # use exemplar::PoolError;
    /// assert_eq!(PoolError::Disposed.is_misuse(), true);
    /// assert_eq!(PoolError::ProtocolViolation("twice".to_owned()).is_misuse(), true);
    /// assert_eq!(PoolError::Config("size".to_owned()).is_misuse(), false);
    /// assert_eq!(PoolError::Build(anyhow::anyhow!("broken")).is_misuse(), false);
    /// ```
    pub fn is_misuse(&self) -> bool {
        matches!(self, PoolError::ProtocolViolation(_) | PoolError::Disposed)
    }
}

/// Represents the result of a pool operation.
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use crate::PoolError;

    #[test]
    fn build_errors_display_their_cause() {
        let error = PoolError::Build(anyhow::anyhow!("Cannot convert record 42"));
        assert_eq!(format!("{}", error), "Cannot convert record 42");
    }

    #[test]
    fn protocol_violations_carry_a_message() {
        let error = PoolError::ProtocolViolation("example returned twice".to_owned());
        assert_eq!(
            format!("{}", error),
            "Example pool protocol violation: example returned twice"
        );
    }
}
