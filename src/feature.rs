use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A statically declared feature: a stable name plus descriptive metadata.
///
/// Metadata is authored alongside the declaration and is never overridden by persisted
/// [crate::FeatureState].
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    name: String,
    metadata: FeatureMetaData,
}

impl Feature {
    /// Declare a feature with the given name. It is disabled by default and labelled with its
    /// own name until told otherwise.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            metadata: FeatureMetaData {
                label: name.clone(),
                enabled_by_default: false,
                groups: Vec::new(),
                attributes: BTreeMap::new(),
            },
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &FeatureMetaData {
        &self.metadata
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.metadata.label = label.into();
        self
    }

    pub fn enabled_by_default(mut self, enabled: bool) -> Self {
        self.metadata.enabled_by_default = enabled;
        self
    }

    pub fn group(mut self, group: impl Into<FeatureGroup>) -> Self {
        let group = group.into();
        if !self.metadata.groups.contains(&group) {
            self.metadata.groups.push(group);
        }
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.attributes.insert(name.into(), value.into());
        self
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Descriptive, static information about a [Feature].
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMetaData {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub groups: Vec<FeatureGroup>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A named grouping of features, used by administrative tooling.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct FeatureGroup {
    label: String,
}

impl FeatureGroup {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true if `feature` was declared as a member of this group.
    pub fn contains(&self, feature: &Feature) -> bool {
        feature.metadata.groups.contains(self)
    }
}

impl From<&str> for FeatureGroup {
    fn from(label: &str) -> Self {
        FeatureGroup::new(label)
    }
}

impl From<String> for FeatureGroup {
    fn from(label: String) -> Self {
        FeatureGroup::new(label)
    }
}

/// Supplies the closed universe of features known to the application.
pub trait FeatureProvider: Send + Sync {
    /// All declared features, in declaration order.
    fn features(&self) -> Vec<Feature>;

    /// Look up a declared feature by name.
    fn feature(&self, name: &str) -> Option<Feature> {
        self.features().into_iter().find(|f| f.name() == name)
    }
}

/// A [FeatureProvider] backed by an explicitly authored list of declarations.
#[derive(Clone, Debug, Default)]
pub struct StaticFeatureProvider {
    features: Vec<Feature>,
    index: HashMap<String, usize>,
}

impl StaticFeatureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. Declaring the same name twice replaces the earlier metadata in place.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        match self.index.get(feature.name()) {
            Some(&i) => self.features[i] = feature,
            None => {
                self.index
                    .insert(feature.name().to_string(), self.features.len());
                self.features.push(feature);
            }
        }
        self
    }

    /// Build declarations from a JSON object mapping feature names to metadata, e.g.
    ///
    /// ```json
    /// {"NEW_UI": {"label": "New UI", "enabledByDefault": true, "groups": ["beta"]}}
    /// ```
    ///
    /// A missing label defaults to the feature name. Declarations are ordered by name.
    pub fn from_json(json: &str) -> Result<Self> {
        let decls: BTreeMap<String, FeatureMetaData> = serde_json::from_str(json)
            .map_err(|e| Error::configuration(format!("invalid feature declarations: {}", e)))?;

        let mut provider = Self::new();
        for (name, mut metadata) in decls {
            if metadata.label.is_empty() {
                metadata.label = name.clone();
            }
            provider = provider.with_feature(Feature { name, metadata });
        }
        Ok(provider)
    }
}

impl FeatureProvider for StaticFeatureProvider {
    fn features(&self) -> Vec<Feature> {
        self.features.clone()
    }

    fn feature(&self, name: &str) -> Option<Feature> {
        self.index.get(name).map(|&i| self.features[i].clone())
    }
}
