use thiserror::Error;

/// Errors raised while resolving or persisting feature state.
#[derive(Debug, Error)]
pub enum Error {
    /// A component was constructed or wired up incorrectly, e.g. a negative cache TTL or a
    /// composite repository without delegates.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stored [crate::FeatureState] names an activation strategy that the registry does not
    /// know about.
    #[error("feature {feature} references unknown activation strategy {strategy_id}")]
    UnknownStrategy {
        /// Name of the feature whose state was being evaluated.
        feature: String,
        /// The unresolvable strategy id.
        strategy_id: String,
    },

    /// A backing store failed. The source error is passed through untouched.
    #[error("state repository error: {0}")]
    Repository(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A composite write fanned out to several delegates and at least one of them failed.
    /// Writes that succeeded are not rolled back.
    #[error("{} of {attempted} repository writes failed", .failures.len())]
    PartialWrite {
        /// Number of delegates the write was attempted on.
        attempted: usize,
        /// Construction-order index of each failing delegate with the error it returned.
        failures: Vec<(usize, Error)>,
    },
}

impl Error {
    /// Wrap an adapter error as [Error::Repository].
    pub fn repository<E>(e: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error::Repository(e.into())
    }

    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
