use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::activation::split_and_trim;
use crate::activation::username::PARAM_USERS;
use crate::activation::username::ID as USERNAME_STRATEGY_ID;

/// The persisted configuration of one feature: an enabled flag, an optional activation
/// strategy and the parameters that strategy consumes.
///
/// Repositories hand out owned values, so mutating a returned state never affects what a
/// repository holds internally. There is no deletion: the absence of a state is what makes the
/// feature fall back to its declared default.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureState {
    feature: String,
    #[serde(default)]
    enabled: bool,
    strategy_id: Option<String>,
    #[serde(default)]
    parameters: BTreeMap<String, String>,
}

impl FeatureState {
    /// Create a state for `feature`, enabled or disabled, with no strategy.
    pub fn new(feature: impl Into<String>, enabled: bool) -> Self {
        Self {
            feature: feature.into(),
            enabled,
            strategy_id: None,
            parameters: BTreeMap::new(),
        }
    }

    /// Create a disabled state for `feature`.
    pub fn disabled(feature: impl Into<String>) -> Self {
        Self::new(feature, false)
    }

    /// Name of the feature this state belongs to.
    pub fn feature(&self) -> &str {
        &self.feature
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = enabled;
        self
    }

    pub fn enable(&mut self) -> &mut Self {
        self.set_enabled(true)
    }

    pub fn disable(&mut self) -> &mut Self {
        self.set_enabled(false)
    }

    pub fn strategy_id(&self) -> Option<&str> {
        self.strategy_id.as_deref()
    }

    /// Select the activation strategy. `None` clears it, which makes an enabled feature active
    /// for everyone.
    pub fn set_strategy_id(&mut self, strategy_id: Option<impl Into<String>>) -> &mut Self {
        self.strategy_id = strategy_id.map(Into::into);
        self
    }

    /// Returns the value of the parameter `name`, if set.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Set the parameter `name`. Passing `None` removes it.
    pub fn set_parameter(
        &mut self,
        name: impl Into<String>,
        value: Option<impl Into<String>>,
    ) -> &mut Self {
        let name = name.into();
        match value {
            Some(v) => {
                self.parameters.insert(name, v.into());
            }
            None => {
                self.parameters.remove(&name);
            }
        }
        self
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Builder-style variant of [FeatureState::set_strategy_id].
    pub fn with_strategy(mut self, strategy_id: impl Into<String>) -> Self {
        self.strategy_id = Some(strategy_id.into());
        self
    }

    /// Builder-style variant of [FeatureState::set_parameter].
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// The user names held in the username strategy's `users` parameter.
    pub fn users(&self) -> Vec<String> {
        split_and_trim(self.parameter(PARAM_USERS), ",")
    }

    /// Append user names to the `users` parameter, keeping the existing order and dropping
    /// duplicates. Also selects the username strategy, like the legacy list-of-users states did.
    pub fn add_users<I, S>(&mut self, users: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let joined = self
            .users()
            .into_iter()
            .chain(users.into_iter().map(Into::into))
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unique()
            .join(",");

        self.strategy_id = Some(USERNAME_STRATEGY_ID.to_string());
        let value = if joined.is_empty() { None } else { Some(joined) };
        self.set_parameter(PARAM_USERS, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use maplit::btreemap;
    use serde_json::json;
    use spectral::prelude::*;

    #[test]
    fn new_state_has_no_strategy() {
        let state = FeatureState::new("F1", true);
        assert_that!(state.feature()).is_equal_to("F1");
        assert_that!(state.is_enabled()).is_true();
        assert_that!(state.strategy_id()).is_none();
        assert!(state.parameters().is_empty());
    }

    #[test]
    fn removing_a_parameter_with_none() {
        let mut state = FeatureState::new("F1", true);
        state.set_parameter("users", Some("alice"));
        assert_that!(state.parameter("users")).is_equal_to(Some("alice"));

        state.set_parameter("users", None::<String>);
        assert_that!(state.parameter("users")).is_none();
        assert_that!(state.parameter_names().count()).is_equal_to(0);
    }

    #[test]
    fn clones_are_independent() {
        let original = FeatureState::new("F1", true)
            .with_strategy("username")
            .with_parameter("users", "alice");

        let mut copy = original.clone();
        copy.disable().set_parameter("users", Some("bob"));

        assert_that!(original.is_enabled()).is_true();
        assert_that!(original.parameter("users")).is_equal_to(Some("alice"));
    }

    #[test]
    fn add_users_deduplicates_and_keeps_order() {
        let mut state = FeatureState::new("F1", true);
        state.set_parameter("users", Some("alice, bob"));
        state.add_users(vec!["carol", "alice", " ", "dave"]);

        assert_that!(state.users()).is_equal_to(vec![
            "alice".to_string(),
            "bob".to_string(),
            "carol".to_string(),
            "dave".to_string(),
        ]);
        assert_that!(state.parameter("users")).is_equal_to(Some("alice,bob,carol,dave"));
        assert_that!(state.strategy_id()).is_equal_to(Some("username"));
    }

    #[test]
    fn users_is_empty_without_parameter() {
        assert_that!(FeatureState::new("F1", true).users()).is_empty();
    }

    #[test]
    fn serializes_without_absent_strategy() {
        let state = FeatureState::new("F1", false);
        assert_json_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"feature": "F1", "enabled": false, "parameters": {}})
        );
    }

    #[test]
    fn deserializes_full_state() {
        let state: FeatureState = serde_json::from_value(json!({
            "feature": "F1",
            "enabled": true,
            "strategyId": "gradual",
            "parameters": {"percentage": "25"}
        }))
        .unwrap();

        assert_that!(state).is_equal_to(
            FeatureState::new("F1", true)
                .with_strategy("gradual")
                .with_parameter("percentage", "25"),
        );
        assert_that!(state.parameters())
            .is_equal_to(&btreemap! {"percentage".to_string() => "25".to_string()});
    }
}
