use crate::activation::{split_and_trim, ActivationStrategy, Parameter, ParameterBuilder};
use crate::state::FeatureState;
use crate::user::FeatureUser;

pub const ID: &str = "username";
pub const PARAM_USERS: &str = "users";

/// Activates the feature for the users listed, comma separated, in the `users` parameter.
///
/// Names are trimmed and compared case-sensitively. Anonymous callers are never active.
#[derive(Clone, Copy, Debug, Default)]
pub struct UsernameActivationStrategy;

impl ActivationStrategy for UsernameActivationStrategy {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Users by name"
    }

    fn is_active(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool {
        let user = match user {
            Some(u) => u,
            None => return false,
        };

        split_and_trim(state.parameter(PARAM_USERS), ",")
            .iter()
            .any(|name| name == user.name())
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![ParameterBuilder::create(PARAM_USERS)
            .label("Users")
            .large_text()
            .description("A list of users for which the feature is active.")
            .build()]
    }
}
