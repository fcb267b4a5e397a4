use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::AttributeValue;

/// The principal on whose behalf a feature is evaluated.
///
/// A user carries a unique name, a flag granting access to feature administration, and
/// arbitrary named attributes that activation strategies may inspect (for example the `roles`
/// attribute read by [crate::activation::user_role::UserRoleActivationStrategy]). Users are
/// only ever inputs to evaluation and are never persisted.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUser {
    name: String,
    #[serde(default)]
    feature_admin: bool,
    #[serde(default)]
    attributes: HashMap<String, AttributeValue>,
}

impl FeatureUser {
    /// Create a user without administrative rights.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_admin(name, false)
    }

    pub fn with_admin(name: impl Into<String>, feature_admin: bool) -> Self {
        Self {
            name: name.into(),
            feature_admin,
            attributes: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_feature_admin(&self) -> bool {
        self.feature_admin
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Set an attribute. Setting [AttributeValue::Null] removes it.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> &mut Self {
        let name = name.into();
        match value.into() {
            AttributeValue::Null => {
                self.attributes.remove(&name);
            }
            value => {
                self.attributes.insert(name, value);
            }
        }
        self
    }

    /// Builder-style variant of [FeatureUser::set_attribute].
    pub fn with_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.set_attribute(name, value);
        self
    }
}

/// Supplies the identity of the current caller.
///
/// Implementations typically read request-scoped context owned by the embedding application.
/// Returning `None` means the caller is anonymous.
pub trait UserProvider: Send + Sync {
    fn current_user(&self) -> Option<FeatureUser>;
}

/// A [UserProvider] that always reports an anonymous caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpUserProvider;

impl UserProvider for NoOpUserProvider {
    fn current_user(&self) -> Option<FeatureUser> {
        None
    }
}

/// A [UserProvider] that always reports the same user.
#[derive(Clone, Debug)]
pub struct StaticUserProvider {
    user: Option<FeatureUser>,
}

impl StaticUserProvider {
    pub fn new(user: Option<FeatureUser>) -> Self {
        Self { user }
    }
}

impl UserProvider for StaticUserProvider {
    fn current_user(&self) -> Option<FeatureUser> {
        self.user.clone()
    }
}

impl<F> UserProvider for F
where
    F: Fn() -> Option<FeatureUser> + Send + Sync,
{
    fn current_user(&self) -> Option<FeatureUser> {
        self()
    }
}
