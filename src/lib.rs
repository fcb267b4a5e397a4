pub mod activation;
mod attribute_value;
mod error;
mod feature;
mod manager;
pub mod repository;
mod state;
mod test_common;
mod user;

pub use activation::gradual::GradualActivationStrategy;
pub use activation::property::{
    EnvPropertySource, MapPropertySource, PropertyDrivenActivationStrategy, PropertySource,
    SystemPropertyActivationStrategy,
};
pub use activation::release_date::ReleaseDateActivationStrategy;
pub use activation::server_ip::ServerIpActivationStrategy;
pub use activation::tokenized::{ProfileActivationStrategy, Token, TokenizedActivationStrategy};
pub use activation::user_role::UserRoleActivationStrategy;
pub use activation::username::UsernameActivationStrategy;
pub use activation::{
    split_and_trim, ActivationStrategy, DefaultStrategyRegistry, Parameter, ParameterBuilder,
    StrategyRegistry,
};
pub use attribute_value::*;
pub use error::*;
pub use feature::*;
pub use manager::*;
pub use repository::cache::*;
pub use repository::composite::*;
pub use repository::listener::*;
pub use repository::logging::*;
pub use repository::memory::*;
pub use repository::StateRepository;
pub use state::*;
pub use user::*;
