use crate::activation::{split_and_trim, ActivationStrategy, Parameter, ParameterBuilder};
use crate::state::FeatureState;
use crate::user::FeatureUser;

pub const ID: &str = "user-role";
pub const PARAM_ROLES: &str = "roles";
/// The user attribute holding the caller's roles, a string or an array of strings.
pub const USER_ATTRIBUTE_ROLES: &str = "roles";

/// Activates the feature for users holding at least one of the roles in the `roles` parameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserRoleActivationStrategy;

impl ActivationStrategy for UserRoleActivationStrategy {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "Users by role"
    }

    fn is_active(&self, state: &FeatureState, user: Option<&FeatureUser>) -> bool {
        let user_roles = match user.and_then(|u| u.attribute(USER_ATTRIBUTE_ROLES)) {
            Some(roles) => roles,
            None => return false,
        };

        split_and_trim(state.parameter(PARAM_ROLES), ",")
            .iter()
            .any(|role| user_roles.contains_str(role))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![ParameterBuilder::create(PARAM_ROLES)
            .label("Roles")
            .description("A list of user roles for which the feature is active.")
            .large_text()
            .build()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute_value::AttributeValue;
    use spectral::prelude::*;

    fn state(roles: &str) -> FeatureState {
        FeatureState::new("F1", true)
            .with_strategy(ID)
            .with_parameter(PARAM_ROLES, roles)
    }

    fn user(roles: AttributeValue) -> FeatureUser {
        FeatureUser::new("alice").with_attribute(USER_ATTRIBUTE_ROLES, roles)
    }

    #[test]
    fn any_matching_role_activates() {
        let alice = user(vec!["dev", "ops"].into());
        assert_that!(UserRoleActivationStrategy.is_active(&state("admin, ops"), Some(&alice)))
            .is_true();
        assert_that!(UserRoleActivationStrategy.is_active(&state("admin"), Some(&alice)))
            .is_false();
    }

    #[test]
    fn single_string_role_is_supported() {
        let alice = user("admin".into());
        assert_that!(UserRoleActivationStrategy.is_active(&state("admin"), Some(&alice))).is_true();
    }

    #[test]
    fn users_without_roles_are_inactive() {
        let plain = FeatureUser::new("bob");
        assert_that!(UserRoleActivationStrategy.is_active(&state("admin"), Some(&plain)))
            .is_false();
        assert_that!(UserRoleActivationStrategy.is_active(&state("admin"), None)).is_false();
    }

    #[test]
    fn blank_parameter_is_inactive() {
        let alice = user(vec!["admin"].into());
        assert_that!(UserRoleActivationStrategy.is_active(&state(" "), Some(&alice))).is_false();
    }
}
