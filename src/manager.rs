use std::sync::Arc;

use log::debug;

use crate::activation::{ActivationStrategy, DefaultStrategyRegistry, StrategyRegistry};
use crate::error::{Error, Result};
use crate::feature::{Feature, FeatureMetaData, FeatureProvider};
use crate::repository::memory::InMemoryStateRepository;
use crate::repository::StateRepository;
use crate::state::FeatureState;
use crate::user::{FeatureUser, NoOpUserProvider, UserProvider};

const DEFAULT_NAME: &str = "default";

/// Answers whether features are active, combining the declared features, the stored states and
/// the registered activation strategies.
///
/// The manager holds no state of its own; caching, composition and notification are layered
/// into the [StateRepository] it is built with. It is cheap to share across threads behind an
/// [Arc].
pub struct FeatureManager {
    name: String,
    features: Arc<dyn FeatureProvider>,
    repository: Arc<dyn StateRepository>,
    users: Arc<dyn UserProvider>,
    strategies: Arc<dyn StrategyRegistry>,
}

impl FeatureManager {
    pub fn builder() -> FeatureManagerBuilder {
        FeatureManagerBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared features. The repository is never consulted to discover features.
    pub fn features(&self) -> Vec<Feature> {
        self.features.features()
    }

    pub fn metadata(&self, feature: &str) -> Option<FeatureMetaData> {
        self.features.feature(feature).map(|f| f.metadata().clone())
    }

    /// The caller reported by the configured [UserProvider].
    pub fn current_user(&self) -> Option<FeatureUser> {
        self.users.current_user()
    }

    /// Strategies available for [FeatureState::strategy_id], in registration order.
    pub fn activation_strategies(&self) -> Vec<Arc<dyn ActivationStrategy>> {
        self.strategies.strategies()
    }

    /// Evaluate `feature` for the current caller.
    pub fn is_active(&self, feature: &str) -> Result<bool> {
        let user = self.current_user();
        self.is_active_for(feature, user.as_ref())
    }

    /// Evaluate `feature` for `user`, or for an anonymous caller when `user` is `None`.
    ///
    /// Without a stored state the declared default applies. A stored state that is disabled is
    /// never active; an enabled one without a strategy is active for everybody. Otherwise the
    /// named strategy decides, and a strategy id the registry does not know is an error.
    /// Repository errors are returned as they are.
    pub fn is_active_for(&self, feature: &str, user: Option<&FeatureUser>) -> Result<bool> {
        let state = match self.repository.feature_state(feature)? {
            Some(state) => state,
            None => return Ok(self.enabled_by_default(feature)),
        };

        if !state.is_enabled() {
            return Ok(false);
        }

        let strategy_id = match state.strategy_id() {
            Some(id) => id,
            None => return Ok(true),
        };

        match self.strategies.lookup(strategy_id) {
            Some(strategy) => Ok(strategy.is_active(&state, user)),
            None => Err(Error::UnknownStrategy {
                feature: feature.to_string(),
                strategy_id: strategy_id.to_string(),
            }),
        }
    }

    /// The stored state of `feature`, or a state synthesized from its declared default.
    pub fn feature_state(&self, feature: &str) -> Result<FeatureState> {
        match self.repository.feature_state(feature)? {
            Some(state) => Ok(state),
            None => Ok(FeatureState::new(feature, self.enabled_by_default(feature))),
        }
    }

    pub fn set_feature_state(&self, state: &FeatureState) -> Result<()> {
        self.repository.set_feature_state(state)
    }

    fn enabled_by_default(&self, feature: &str) -> bool {
        let enabled = self
            .features
            .feature(feature)
            .map_or(false, |f| f.metadata().enabled_by_default);
        debug!(
            "no stored state for feature {}, using declared default {}",
            feature, enabled
        );
        enabled
    }
}

/// Assembles a [FeatureManager].
///
/// Only the feature declarations are required. Unless configured otherwise the manager stores
/// states in memory, sees every caller as anonymous and knows the built-in strategies of
/// [DefaultStrategyRegistry::with_defaults].
#[derive(Default)]
pub struct FeatureManagerBuilder {
    name: Option<String>,
    features: Option<Arc<dyn FeatureProvider>>,
    repository: Option<Arc<dyn StateRepository>>,
    users: Option<Arc<dyn UserProvider>>,
    strategies: Option<Arc<dyn StrategyRegistry>>,
}

impl FeatureManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn features(mut self, provider: impl FeatureProvider + 'static) -> Self {
        self.features = Some(Arc::new(provider));
        self
    }

    pub fn state_repository(mut self, repository: impl StateRepository + 'static) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    pub fn user_provider(mut self, provider: impl UserProvider + 'static) -> Self {
        self.users = Some(Arc::new(provider));
        self
    }

    pub fn strategy_registry(mut self, registry: impl StrategyRegistry + 'static) -> Self {
        self.strategies = Some(Arc::new(registry));
        self
    }

    pub fn build(self) -> Result<FeatureManager> {
        let features = self.features.ok_or_else(|| {
            Error::configuration("a feature manager requires a feature provider")
        })?;

        Ok(FeatureManager {
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            features,
            repository: self
                .repository
                .unwrap_or_else(|| Arc::new(InMemoryStateRepository::new())),
            users: self.users.unwrap_or_else(|| Arc::new(NoOpUserProvider)),
            strategies: self
                .strategies
                .unwrap_or_else(|| Arc::new(DefaultStrategyRegistry::with_defaults())),
        })
    }
}
