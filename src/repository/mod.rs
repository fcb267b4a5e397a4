//! Persistence of [FeatureState] and the decorators that layer behaviour on top of it.
//!
//! Every backend adapter implements [StateRepository]. The decorators in this module wrap another
//! repository and add exactly one concern, so they stack freely, e.g.
//!
//! ```
//! use std::sync::Arc;
//! use feature_state_evaluation::*;
//!
//! let remote = Arc::new(InMemoryStateRepository::new());
//! let overrides = Arc::new(InMemoryStateRepository::new());
//! let composite = CompositeStateRepository::new(vec![overrides, remote]).unwrap();
//! let repository = ListenableStateRepository::new(CachingStateRepository::new(composite));
//! # let _ = repository;
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::state::FeatureState;

pub mod cache;
pub mod composite;
pub mod listener;
pub mod logging;
pub mod memory;

/// The storage contract for feature state.
///
/// Implementations are storage-agnostic. The only guarantee the engine relies on is that a
/// [StateRepository::set_feature_state] followed by a [StateRepository::feature_state] for the
/// same feature on the same instance, with no concurrent write in between, returns an
/// equivalent state. Racing writers are last-writer-wins.
pub trait StateRepository: Send + Sync {
    /// Retrieve the state stored for `feature`.
    ///
    /// Returns `Ok(None)` when nothing was ever stored; an unknown feature is not an error.
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>>;

    /// Replace the stored state of `state.feature()` with `state`. This is a full replacement,
    /// not a patch.
    fn set_feature_state(&self, state: &FeatureState) -> Result<()>;
}

impl<R: StateRepository + ?Sized> StateRepository for Arc<R> {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        (**self).feature_state(feature)
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        (**self).set_feature_state(state)
    }
}

impl<R: StateRepository + ?Sized> StateRepository for Box<R> {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        (**self).feature_state(feature)
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        (**self).set_feature_state(state)
    }
}
