use std::collections::HashMap;
use std::env;

use parking_lot::RwLock;

use crate::activation::{ActivationStrategy, Parameter, ParameterBuilder};
use crate::state::FeatureState;
use crate::user::FeatureUser;

pub const PROPERTY_PREFIX: &str = "togglz.";
pub const PARAM_NAME: &str = "name";
pub const PARAM_PROPERTY_VALUE: &str = "value";
const DEFAULT_EXPECTED_VALUE: &str = "true";

/// A source of named string properties.
pub trait PropertySource: Send + Sync {
    fn property(&self, name: &str) -> Option<String>;
}

/// Reads properties from the process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvPropertySource;

impl PropertySource for EnvPropertySource {
    fn property(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// Properties held in memory. They can be changed at runtime.
#[derive(Debug, Default)]
pub struct MapPropertySource {
    properties: RwLock<HashMap<String, String>>,
}

impl MapPropertySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_properties<I, K, V>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            properties: RwLock::new(
                properties
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.properties.write().remove(name);
    }
}

impl PropertySource for MapPropertySource {
    fn property(&self, name: &str) -> Option<String> {
        self.properties.read().get(name).cloned()
    }
}

/// A strategy that activates a feature based on the value of an external property.
///
/// The property name comes from the parameter
/// [PropertyDrivenActivationStrategy::property_name_parameter] and falls back to
/// `togglz.<FEATURE>`. The feature is active if the property is set, not
/// blank, and equals the `value` parameter ignoring case; `value` defaults to `true`.
pub trait PropertyDrivenActivationStrategy {
    fn property_name_parameter(&self) -> &str {
        PARAM_NAME
    }

    fn property_value(
        &self,
        state: &FeatureState,
        user: Option<&FeatureUser>,
        name: &str,
    ) -> Option<String>;

    fn property_name(&self, state: &FeatureState) -> String {
        match state.parameter(self.property_name_parameter()) {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("{}{}", PROPERTY_PREFIX, state.feature()),
        }
    }

    fn is_active_for_property(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool {
        let name = self.property_name(state);
        let expected = state
            .parameter(PARAM_PROPERTY_VALUE)
            .unwrap_or(DEFAULT_EXPECTED_VALUE);

        match self.property_value(state, user, &name) {
            Some(value) if !value.trim().is_empty() => expected.eq_ignore_ascii_case(&value),
            _ => false,
        }
    }
}

pub const SYSTEM_PROPERTY_ID: &str = "property";
pub const PARAM_SYSTEM_PROPERTY: &str = "system-property";

/// Activates a feature from a process-level property, by default an environment variable.
pub struct SystemPropertyActivationStrategy<P = EnvPropertySource> {
    source: P,
}

impl<P: PropertySource> SystemPropertyActivationStrategy<P> {
    pub fn new(source: P) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &P {
        &self.source
    }
}

impl<P: PropertySource> PropertyDrivenActivationStrategy for SystemPropertyActivationStrategy<P> {
    fn property_name_parameter(&self) -> &str {
        PARAM_SYSTEM_PROPERTY
    }

    fn property_value(
        &self,
        _state: &FeatureState,
        _user: Option<&FeatureUser>,
        name: &str,
    ) -> Option<String> {
        self.source.property(name)
    }
}

impl<P: PropertySource> ActivationStrategy for SystemPropertyActivationStrategy<P> {
    fn id(&self) -> &str {
        SYSTEM_PROPERTY_ID
    }

    fn name(&self) -> &str {
        "System Property"
    }

    fn is_active(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool {
        self.is_active_for_property(state, user)
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![
            ParameterBuilder::create(PARAM_SYSTEM_PROPERTY)
                .optional()
                .label("System Property Name")
                .description(
                    "A system property name that can be set for which a feature should be active",
                )
                .build(),
            ParameterBuilder::create(PARAM_PROPERTY_VALUE)
                .optional()
                .label("System Property Value")
                .description("Enable the feature when this value matches the system property value")
                .build(),
        ]
    }
}
