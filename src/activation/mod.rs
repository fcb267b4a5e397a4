//! Activation strategies decide whether an enabled feature is active for a given caller.
//!
//! A [FeatureState] names its strategy by id; the [crate::FeatureManager] resolves that id through
//! a [StrategyRegistry] and asks the strategy for a decision. Strategies are pure: they read the
//! state's parameters and the caller, and never mutate either.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::state::FeatureState;
use crate::user::FeatureUser;

pub mod gradual;
pub mod property;
pub mod release_date;
pub mod server_ip;
pub mod tokenized;
pub mod user_role;
pub mod username;

/// A pluggable rule turning a [FeatureState] and an optional caller into an activation decision.
pub trait ActivationStrategy: Send + Sync {
    /// Stable identifier stored in [FeatureState::strategy_id].
    fn id(&self) -> &str;

    /// Human-readable name for administrative tooling.
    fn name(&self) -> &str;

    /// Decide whether the feature is active. `user` is `None` for anonymous callers.
    ///
    /// Strategies never fail: malformed parameters are logged and treated as inactive.
    fn is_active(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool;

    /// Describes the parameters this strategy reads. Only used by tooling.
    fn parameters(&self) -> Vec<Parameter> {
        Vec::new()
    }
}

/// Describes one parameter accepted by an [ActivationStrategy].
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    label: String,
    description: Option<String>,
    optional: bool,
    large_text: bool,
    pattern: Option<Regex>,
}

impl Parameter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_large_text(&self) -> bool {
        self.large_text
    }

    /// The validation pattern, anchored at both ends.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(Regex::as_str)
    }

    /// Returns true if `value` matches the whole validation pattern, or if there is none.
    pub fn is_valid(&self, value: &str) -> bool {
        self.pattern.as_ref().map_or(true, |p| p.is_match(value))
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.name)
    }
}

/// Builds a [Parameter]. The label defaults to the name.
#[derive(Clone, Debug)]
pub struct ParameterBuilder {
    parameter: Parameter,
}

impl ParameterBuilder {
    pub fn create(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            parameter: Parameter {
                label: name.clone(),
                name,
                description: None,
                optional: false,
                large_text: false,
                pattern: None,
            },
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.parameter.label = label.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.parameter.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.parameter.optional = true;
        self
    }

    pub fn large_text(mut self) -> Self {
        self.parameter.large_text = true;
        self
    }

    /// Require values to match `pattern` in full. An invalid pattern is a configuration error.
    pub fn matching(mut self, pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{})$", pattern);
        let regex = Regex::new(&anchored).map_err(|e| {
            Error::configuration(format!(
                "invalid pattern for parameter {}: {}",
                self.parameter.name, e
            ))
        })?;
        self.parameter.pattern = Some(regex);
        Ok(self)
    }

    /// Like [ParameterBuilder::matching] for a pattern that is already compiled and anchored.
    pub(crate) fn matching_regex(mut self, regex: &Regex) -> Self {
        self.parameter.pattern = Some(regex.clone());
        self
    }

    pub fn build(self) -> Parameter {
        self.parameter
    }
}

/// Split `value` on the literal `separator`, trimming every part and dropping blank ones.
///
/// An absent value yields an empty list.
pub fn split_and_trim(value: Option<&str>, separator: &str) -> Vec<String> {
    match value {
        Some(v) => v
            .split(separator)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Resolves strategy ids to [ActivationStrategy] instances.
pub trait StrategyRegistry: Send + Sync {
    fn lookup(&self, id: &str) -> Option<Arc<dyn ActivationStrategy>>;

    /// Every registered strategy, in registration order.
    fn strategies(&self) -> Vec<Arc<dyn ActivationStrategy>>;
}

/// A [StrategyRegistry] populated explicitly at startup.
#[derive(Default)]
pub struct DefaultStrategyRegistry {
    strategies: Vec<Arc<dyn ActivationStrategy>>,
    index: HashMap<String, usize>,
}

impl DefaultStrategyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in strategies that need no external wiring: `username`,
    /// `gradual`, `release-date`, `user-role`, `property` (backed by the process environment) and
    /// `server-ip` (matching this host's addresses).
    pub fn with_defaults() -> Self {
        let builtins: [Arc<dyn ActivationStrategy>; 6] = [
            Arc::new(username::UsernameActivationStrategy),
            Arc::new(gradual::GradualActivationStrategy),
            Arc::new(release_date::ReleaseDateActivationStrategy::new()),
            Arc::new(user_role::UserRoleActivationStrategy),
            Arc::new(property::SystemPropertyActivationStrategy::new(
                property::EnvPropertySource,
            )),
            Arc::new(server_ip::ServerIpActivationStrategy::new()),
        ];

        let mut registry = Self::new();
        for strategy in builtins {
            registry.insert(strategy);
        }
        registry
    }

    /// Add a strategy. Registering a second strategy under an existing id is a configuration
    /// error.
    pub fn register(&mut self, strategy: Arc<dyn ActivationStrategy>) -> Result<()> {
        if self.index.contains_key(strategy.id()) {
            return Err(Error::configuration(format!(
                "activation strategy {} is already registered",
                strategy.id()
            )));
        }
        self.insert(strategy);
        Ok(())
    }

    /// Builder-style variant of [DefaultStrategyRegistry::register].
    pub fn with_strategy(mut self, strategy: Arc<dyn ActivationStrategy>) -> Result<Self> {
        self.register(strategy)?;
        Ok(self)
    }

    fn insert(&mut self, strategy: Arc<dyn ActivationStrategy>) {
        self.index
            .insert(strategy.id().to_string(), self.strategies.len());
        self.strategies.push(strategy);
    }
}

impl StrategyRegistry for DefaultStrategyRegistry {
    fn lookup(&self, id: &str) -> Option<Arc<dyn ActivationStrategy>> {
        self.index.get(id).map(|&i| self.strategies[i].clone())
    }

    fn strategies(&self) -> Vec<Arc<dyn ActivationStrategy>> {
        self.strategies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;
    use test_case::test_case;

    struct Always;

    impl ActivationStrategy for Always {
        fn id(&self) -> &str {
            "always"
        }

        fn name(&self) -> &str {
            "Always"
        }

        fn is_active(&self, _state: &FeatureState, _user: Option<&FeatureUser>) -> bool {
            true
        }
    }

    #[test_case(Some("alice, bob ,carol"), vec!["alice", "bob", "carol"])]
    #[test_case(Some(" , alice,,"), vec!["alice"])]
    #[test_case(Some(""), vec![])]
    #[test_case(None, vec![])]
    fn split_and_trim_drops_blanks(value: Option<&str>, expected: Vec<&str>) {
        let expected: Vec<String> = expected.into_iter().map(String::from).collect();
        assert_that!(split_and_trim(value, ",")).is_equal_to(expected);
    }

    #[test]
    fn parameter_label_defaults_to_name() {
        let parameter = ParameterBuilder::create("users").build();
        assert_that!(parameter.label()).is_equal_to("users");
        assert_that!(parameter.description()).is_none();
        assert_that!(parameter.is_optional()).is_false();
        assert_that!(parameter.is_valid("anything")).is_true();
    }

    #[test]
    fn parameter_pattern_is_anchored() {
        let parameter = ParameterBuilder::create("percentage")
            .label("Percentage")
            .optional()
            .large_text()
            .matching(r"\d{1,3}")
            .unwrap()
            .build();

        assert_that!(parameter.is_valid("25")).is_true();
        assert_that!(parameter.is_valid("1000")).is_false();
        assert_that!(parameter.is_valid("x25")).is_false();
        assert_that!(parameter.is_optional()).is_true();
        assert_that!(parameter.is_large_text()).is_true();
        assert_that!(parameter.to_string()).is_equal_to("Percentage (percentage)".to_string());
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        let result = ParameterBuilder::create("broken").matching("(");
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn defaults_are_registered_in_order() {
        let registry = DefaultStrategyRegistry::with_defaults();
        let ids: Vec<String> = registry
            .strategies()
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_that!(ids).is_equal_to(
            [
                "username",
                "gradual",
                "release-date",
                "user-role",
                "property",
                "server-ip",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>(),
        );
        assert_that!(registry.lookup("gradual").map(|s| s.name().to_string()))
            .is_equal_to(Some("Gradual rollout".to_string()));
        assert_that!(registry.lookup("nope").is_none()).is_true();
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut registry = DefaultStrategyRegistry::new().with_strategy(Arc::new(Always)).unwrap();
        assert!(matches!(
            registry.register(Arc::new(Always)),
            Err(Error::Configuration(_))
        ));
        assert_that!(registry.strategies().len()).is_equal_to(1);
    }
}
