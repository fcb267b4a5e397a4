use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::activation::{ActivationStrategy, Parameter, ParameterBuilder};
use crate::state::FeatureState;
use crate::user::FeatureUser;

lazy_static! {
    pub(crate) static ref TOKEN_SEPARATOR: Regex = Regex::new(r"[\s,]+").unwrap();
}

const NEGATION: char = '!';

/// One entry of a token list parameter, e.g. `prod` or `!staging`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    value: String,
    negated: bool,
}

impl Token {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }
}

/// Split the parameter `name` of `state` into tokens.
///
/// The value is split on commas and whitespace. `transform`, if given, runs on each raw token
/// before a leading `!` is stripped and recorded as negation.
pub fn tokenize(
    state: &FeatureState,
    name: &str,
    transform: Option<&dyn Fn(&str) -> String>,
) -> Vec<Token> {
    let raw = match state.parameter(name) {
        Some(raw) => raw,
        None => return Vec::new(),
    };

    TOKEN_SEPARATOR
        .split(raw)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let s = match transform {
                Some(f) => f(s),
                None => s.to_string(),
            };
            match s.strip_prefix(NEGATION) {
                Some(rest) => Token {
                    value: rest.to_string(),
                    negated: true,
                },
                None => Token {
                    value: s,
                    negated: false,
                },
            }
        })
        .collect()
}

/// A strategy driven by a list of possibly negated tokens.
///
/// Implementors provide the parameter name and a predicate telling whether a token's value
/// holds for the current context. The feature is active if any token's predicate result differs
/// from its negation flag, so `prod` activates where `prod` holds and `!prod` activates wherever
/// it does not.
pub trait TokenizedActivationStrategy {
    fn token_parameter_name(&self) -> &str;

    /// Applied to each raw token before negation is detected.
    fn transform_token(&self, token: &str) -> String {
        token.to_string()
    }

    fn token_matches(
        &self,
        token: &Token,
        state: &FeatureState,
        user: Option<&FeatureUser>,
    ) -> bool;

    fn tokens(&self, state: &FeatureState) -> Vec<Token> {
        let transform: &dyn Fn(&str) -> String = &|t| self.transform_token(t);
        tokenize(state, self.token_parameter_name(), Some(transform))
    }

    fn is_active_for_tokens(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool {
        self.tokens(state)
            .iter()
            .any(|token| self.token_matches(token, state, user) != token.is_negated())
    }
}

pub const PROFILE_ID: &str = "profile";
pub const PARAM_PROFILES: &str = "profiles";

/// Activates the feature when one of the listed deployment profiles is active, or one of the
/// negated ones is not. Profile names are compared case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct ProfileActivationStrategy {
    active_profiles: HashSet<String>,
}

impl ProfileActivationStrategy {
    pub fn new<I, S>(active_profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            active_profiles: active_profiles
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn is_profile_active(&self, profile: &str) -> bool {
        self.active_profiles.contains(&profile.to_lowercase())
    }
}

impl TokenizedActivationStrategy for ProfileActivationStrategy {
    fn token_parameter_name(&self) -> &str {
        PARAM_PROFILES
    }

    fn transform_token(&self, token: &str) -> String {
        token.to_lowercase()
    }

    fn token_matches(
        &self,
        token: &Token,
        _state: &FeatureState,
        _user: Option<&FeatureUser>,
    ) -> bool {
        self.active_profiles.contains(token.value())
    }
}

impl ActivationStrategy for ProfileActivationStrategy {
    fn id(&self) -> &str {
        PROFILE_ID
    }

    fn name(&self) -> &str {
        "Profile"
    }

    fn is_active(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool {
        self.is_active_for_tokens(state, user)
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![ParameterBuilder::create(PARAM_PROFILES)
            .label("Profile Names")
            .description(
                "A comma-separated list of profile names for which the feature should be active. \
                 A profile can be negated by prefixing the name with the ! operator",
            )
            .build()]
    }
}
