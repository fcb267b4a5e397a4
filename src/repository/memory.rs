use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::repository::StateRepository;
use crate::state::FeatureState;

/// A volatile [StateRepository] holding states in process memory.
///
/// Used as the default repository of [crate::FeatureManagerBuilder] and as a local override
/// store underneath a [crate::CompositeStateRepository]. Reads return copies.
#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    states: RwLock<HashMap<String, FeatureState>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-populated with `states`.
    pub fn with_states(states: impl IntoIterator<Item = FeatureState>) -> Self {
        Self {
            states: RwLock::new(
                states
                    .into_iter()
                    .map(|s| (s.feature().to_string(), s))
                    .collect(),
            ),
        }
    }
}

impl StateRepository for InMemoryStateRepository {
    fn feature_state(&self, feature: &str) -> Result<Option<FeatureState>> {
        Ok(self.states.read().get(feature).cloned())
    }

    fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        self.states
            .write()
            .insert(state.feature().to_string(), state.clone());
        Ok(())
    }
}
