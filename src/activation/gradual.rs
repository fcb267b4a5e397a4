use lazy_static::lazy_static;
use log::error;
use regex::Regex;
use sha1::{Digest, Sha1};

use crate::activation::{ActivationStrategy, Parameter, ParameterBuilder};
use crate::state::FeatureState;
use crate::user::FeatureUser;

pub const ID: &str = "gradual";
pub const PARAM_PERCENTAGE: &str = "percentage";

lazy_static! {
    static ref PERCENTAGE_PATTERN: Regex = Regex::new(r"^\d{1,3}$").unwrap();
}

/// Rolls a feature out to a stable percentage of named users.
///
/// Each user lands in a bucket between 0 and 99 derived from the feature and the user's name, so
/// a user keeps the same decision while the percentage stays the same and stays included when it
/// grows. Anonymous users and users with a blank name are never active.
#[derive(Clone, Copy, Debug, Default)]
pub struct GradualActivationStrategy;

impl GradualActivationStrategy {
    /// The bucket, in `0..100`, of user `name` for `feature`. Names are trimmed and lowercased.
    pub fn bucket(feature: &str, name: &str) -> u8 {
        let mut hash = Sha1::new();
        hash.update(feature.as_bytes());
        hash.update(b".");
        hash.update(name.trim().to_lowercase().as_bytes());
        let digest = hash.finalize();

        let hexhash = base16ct::lower::encode_string(&digest);
        // 15 hex digits always fit in a u64
        let numhash = u64::from_str_radix(&hexhash[..15], 16).unwrap_or_default();
        (numhash % 100) as u8
    }
}

impl ActivationStrategy for GradualActivationStrategy {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Gradual rollout"
    }

    fn is_active(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool {
        let user = match user {
            Some(u) if !u.name().trim().is_empty() => u,
            _ => return false,
        };

        let raw = state.parameter(PARAM_PERCENTAGE).unwrap_or_default();
        let percentage = match raw.trim().parse::<i64>() {
            Ok(p) => p,
            Err(_) => {
                error!(
                    "Invalid gradual rollout percentage for feature {}: {:?}",
                    state.feature(),
                    raw
                );
                return false;
            }
        };

        percentage > 0 && i64::from(Self::bucket(state.feature(), user.name())) < percentage
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![ParameterBuilder::create(PARAM_PERCENTAGE)
            .label("Percentage")
            .matching_regex(&PERCENTAGE_PATTERN)
            .description(
                "Percentage of users for which the feature should be active \
                 (i.e. '25' for every fourth user).",
            )
            .build()]
    }
}
