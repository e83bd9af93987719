//! Network descriptors (`--net`).
//!
//! A descriptor is `name`, `ip`, `name:ip`, `name:mode`, `container:<ref>` or
//! `name:param:mode`. Descriptors combine into one [`NetworkMode`] plus the
//! static endpoint addresses requested per network.

use super::ValidationError;
use crate::container::{EndpointIpamConfig, EndpointSettings, NetworkMode, NetworkingConfig};
use std::net::IpAddr;

/// Network the bare-IP form attaches to.
pub const DEFAULT_NETWORK: &str = "bridge";

/// Mode qualifier that makes a descriptor override the network mode.
const MODE_QUALIFIER: &str = "mode";

/// One parsed `--net` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkDescriptor {
    pub name: String,
    pub parameter: String,
    pub mode: String,
}

impl NetworkDescriptor {
    fn is_container(&self) -> bool {
        self.name == "container"
    }

    /// Parameter as an IP address, if it is one.
    fn address(&self) -> Option<IpAddr> {
        self.parameter.parse().ok()
    }
}

/// Parse a single descriptor.
pub fn parse_network(raw: &str) -> Result<NetworkDescriptor, ValidationError> {
    let network = raw.trim();
    if network.is_empty() {
        return Err(ValidationError::new("net", raw, "invalid network: cannot be empty"));
    }

    let parts: Vec<&str> = network.splitn(3, ':').collect();
    let mut descriptor = NetworkDescriptor::default();

    match parts.as_slice() {
        [] => return Err(ValidationError::new("net", raw, "invalid network: cannot be empty")),
        [single] => {
            if single.parse::<IpAddr>().is_ok() {
                descriptor.name = DEFAULT_NETWORK.to_string();
                descriptor.parameter = single.to_string();
            } else {
                descriptor.name = single.to_string();
            }
        }
        [name, second] => {
            descriptor.name = name.to_string();
            if *name == "container" || second.parse::<IpAddr>().is_ok() {
                descriptor.parameter = second.to_string();
            } else {
                descriptor.mode = second.to_string();
            }
        }
        [name, parameter, mode, ..] => {
            descriptor.name = name.to_string();
            descriptor.parameter = parameter.to_string();
            descriptor.mode = mode.to_string();
        }
    }

    if descriptor.name.is_empty() {
        return Err(ValidationError::new("net", raw, "network name cannot be empty"));
    }
    if descriptor.is_container() && descriptor.parameter.is_empty() {
        return Err(ValidationError::new(
            "net",
            raw,
            "container network mode needs a target container",
        ));
    }
    Ok(descriptor)
}

/// Combine descriptors into the network mode and endpoint settings.
///
/// With no descriptors the mode is `bridge`. Otherwise the first descriptor
/// sets it, a later one overrides it only when its qualifier is `mode`, and a
/// `container:` descriptor always does.
pub fn parse_networks(
    descriptors: &[String],
) -> Result<(NetworkMode, NetworkingConfig), ValidationError> {
    let mut mode: Option<NetworkMode> = None;
    let mut networking = NetworkingConfig::default();

    for raw in descriptors {
        let descriptor = parse_network(raw)?;

        if descriptor.is_container() {
            mode = Some(NetworkMode::Container(descriptor.parameter));
            continue;
        }

        if mode.is_none() || descriptor.mode == MODE_QUALIFIER {
            mode = Some(NetworkMode::from_name(&descriptor.name));
        }

        if let Some(address) = descriptor.address() {
            let endpoint = networking.endpoints.entry(descriptor.name.clone()).or_default();
            set_address(endpoint, address);
        }
    }

    Ok((mode.unwrap_or_default(), networking))
}

fn set_address(endpoint: &mut EndpointSettings, address: IpAddr) {
    endpoint.ip_address = address.to_string();
    endpoint.ipam = match address {
        IpAddr::V4(v4) => EndpointIpamConfig {
            ipv4_address: v4.to_string(),
            ..endpoint.ipam.clone()
        },
        IpAddr::V6(v6) => EndpointIpamConfig {
            ipv6_address: v6.to_string(),
            ..endpoint.ipam.clone()
        },
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nets(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn descriptor(name: &str, parameter: &str, mode: &str) -> NetworkDescriptor {
        NetworkDescriptor {
            name: name.to_string(),
            parameter: parameter.to_string(),
            mode: mode.to_string(),
        }
    }

    #[test]
    fn test_parse_network_shapes() {
        assert_eq!(parse_network("mynet").unwrap(), descriptor("mynet", "", ""));
        assert_eq!(
            parse_network("172.17.0.5").unwrap(),
            descriptor("bridge", "172.17.0.5", "")
        );
        assert_eq!(
            parse_network("mynet:172.17.0.5").unwrap(),
            descriptor("mynet", "172.17.0.5", "")
        );
        assert_eq!(parse_network("mynet:mode").unwrap(), descriptor("mynet", "", "mode"));
        assert_eq!(
            parse_network("container:abc123").unwrap(),
            descriptor("container", "abc123", "")
        );
        assert_eq!(
            parse_network("mynet:10.0.0.2:mode").unwrap(),
            descriptor("mynet", "10.0.0.2", "mode")
        );
    }

    #[test]
    fn test_parse_network_rejects_empty() {
        assert_eq!(parse_network("").unwrap_err().field, "net");
        assert!(parse_network("   ").is_err());
        assert!(parse_network(":mode").is_err());
        assert!(parse_network("container:").is_err());
    }

    #[test]
    fn test_no_networks_defaults_to_bridge() {
        let (mode, networking) = parse_networks(&[]).unwrap();
        assert_eq!(mode, NetworkMode::Bridge);
        assert!(networking.endpoints.is_empty());
    }

    #[test]
    fn test_named_network_with_address() {
        let (mode, networking) = parse_networks(&nets(&["mynet:172.17.0.5"])).unwrap();
        assert_eq!(mode, NetworkMode::Named("mynet".to_string()));

        let endpoint = &networking.endpoints["mynet"];
        assert_eq!(endpoint.ip_address, "172.17.0.5");
        assert_eq!(endpoint.ipam.ipv4_address, "172.17.0.5");
        assert!(endpoint.ipam.ipv6_address.is_empty());
    }

    #[test]
    fn test_bare_address_attaches_to_bridge() {
        let (mode, networking) = parse_networks(&nets(&["10.1.1.1"])).unwrap();
        assert_eq!(mode, NetworkMode::Bridge);
        assert_eq!(networking.endpoints["bridge"].ip_address, "10.1.1.1");
    }

    #[test]
    fn test_container_mode_skips_endpoints() {
        let (mode, networking) = parse_networks(&nets(&["container:abc123"])).unwrap();
        assert_eq!(mode, NetworkMode::Container("abc123".to_string()));
        assert!(networking.endpoints.is_empty());

        // container: wins even after another network set the mode
        let (mode, _) = parse_networks(&nets(&["host", "container:web"])).unwrap();
        assert_eq!(mode.container_ref(), Some("web"));
    }

    #[test]
    fn test_mode_precedence() {
        // first descriptor wins without a qualifier
        let (mode, _) = parse_networks(&nets(&["net1", "net2"])).unwrap();
        assert_eq!(mode, NetworkMode::Named("net1".to_string()));

        // an explicit qualifier overrides, the last one winning
        let (mode, _) = parse_networks(&nets(&["net1", "host:mode"])).unwrap();
        assert_eq!(mode, NetworkMode::Host);
        let (mode, _) = parse_networks(&nets(&["net1:mode", "net2:mode", "net3"])).unwrap();
        assert_eq!(mode, NetworkMode::Named("net2".to_string()));
    }

    #[test]
    fn test_endpoints_for_several_networks() {
        let (_, networking) =
            parse_networks(&nets(&["net1:10.0.0.2", "net2:10.0.1.2:mode", "net3"])).unwrap();
        assert_eq!(networking.endpoints.len(), 2);
        assert_eq!(networking.endpoints["net2"].ipam.ipv4_address, "10.0.1.2");
    }
}
