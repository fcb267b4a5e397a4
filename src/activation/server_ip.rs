use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};

use lazy_static::lazy_static;
use log::{error, warn};

use crate::activation::tokenized::TOKEN_SEPARATOR;
use crate::activation::{ActivationStrategy, Parameter, ParameterBuilder};
use crate::state::FeatureState;
use crate::user::FeatureUser;

pub const ID: &str = "server-ip";
pub const PARAM_IPS: &str = "ips";

lazy_static! {
    static ref LOCAL_ADDRESSES: HashSet<IpAddr> = local_addresses();
}

/// The loopback addresses plus whatever the host name resolves to.
fn local_addresses() -> HashSet<IpAddr> {
    let mut addresses: HashSet<IpAddr> = [
        IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(Ipv6Addr::LOCALHOST),
    ]
    .into_iter()
    .collect();

    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy();
            match (&*name, 0).to_socket_addrs() {
                Ok(resolved) => addresses.extend(resolved.map(|a| a.ip())),
                Err(e) => error!("Unable to resolve IP addresses of host {}: {}", name, e),
            }
        }
        Err(e) => error!("Unable to find IP addresses: {}", e),
    }

    addresses
}

/// Activates the feature on servers owning one of the addresses listed in the `ips` parameter.
///
/// Entries may be separated by commas or whitespace. Entries that are not IP addresses are
/// logged and skipped.
#[derive(Clone, Debug, Default)]
pub struct ServerIpActivationStrategy {
    addresses: Option<HashSet<IpAddr>>,
}

impl ServerIpActivationStrategy {
    /// Match against the addresses of this host, resolved once per process on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match against `addresses` instead of the host's own.
    pub fn with_addresses<I>(addresses: I) -> Self
    where
        I: IntoIterator<Item = IpAddr>,
    {
        Self {
            addresses: Some(addresses.into_iter().collect()),
        }
    }

    pub fn addresses(&self) -> &HashSet<IpAddr> {
        self.addresses.as_ref().unwrap_or(&LOCAL_ADDRESSES)
    }
}

impl ActivationStrategy for ServerIpActivationStrategy {
    fn id(&self) -> &str {
        ID
    }

    fn name(&self) -> &str {
        "IP address (server)"
    }

    fn is_active(&self, state: &FeatureState, _user: Option<&FeatureUser>) -> bool {
        let raw = match state.parameter(PARAM_IPS) {
            Some(raw) => raw,
            None => return false,
        };

        let addresses = self.addresses();
        TOKEN_SEPARATOR
            .split(raw)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse::<IpAddr>() {
                Ok(ip) => Some(ip),
                Err(_) => {
                    warn!("Ignoring invalid IP address {:?} for feature {}", s, state.feature());
                    None
                }
            })
            .any(|ip| addresses.contains(&ip))
    }

    fn parameters(&self) -> Vec<Parameter> {
        vec![ParameterBuilder::create(PARAM_IPS)
            .label("Server IPs")
            .description(
                "A comma-separated list of server IPs for which the feature should be active.",
            )
            .build()]
    }
}
