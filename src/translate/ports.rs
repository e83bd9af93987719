//! Port publishing (`--publish`) and exposure (`--expose`) specs.
//!
//! Publish grammar: `[ip:][hostPort:]containerPort[-endPort][/proto]`, with
//! IPv6 host addresses in brackets (`[::1]:8080:80`).

use super::ValidationError;
use crate::container::{PortBinding, PortKey, Protocol};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// One container port and the host binding requested for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub port: PortKey,
    pub binding: PortBinding,
}

/// Split `port[/proto]` into `(proto, port)`; a missing protocol means tcp.
pub fn split_proto_port(raw: &str) -> (&str, &str) {
    let mut parts = raw.split('/');
    let port = parts.next().unwrap_or_default();
    if port.is_empty() {
        return ("", "");
    }
    match parts.next() {
        None | Some("") => ("tcp", port),
        Some(proto) => (proto, port),
    }
}

/// Parse `port` or `start-end` into an inclusive range.
pub fn parse_port_range(ports: &str) -> Result<(u16, u16), String> {
    if ports.is_empty() {
        return Err("empty string specified for ports".to_string());
    }

    let mut parts = ports.split('-');
    let start = parse_port(parts.next().unwrap_or_default())?;
    let end = match parts.next() {
        Some(end) => parse_port(end)?,
        None => start,
    };

    if end < start {
        return Err(format!("invalid range specified for the port: {}", ports));
    }
    Ok((start, end))
}

fn parse_port(port: &str) -> Result<u16, String> {
    port.parse::<u16>()
        .map_err(|e| format!("invalid port {:?}: {}", port, e))
}

/// Split `ip:host:container` from the right.
fn split_parts(raw: &str) -> (String, &str, &str) {
    let parts: Vec<&str> = raw.split(':').collect();
    let n = parts.len();
    let container_port = parts[n - 1];
    match n {
        1 => (String::new(), "", container_port),
        2 => (String::new(), parts[0], container_port),
        3 => (parts[0].to_string(), parts[1], container_port),
        _ => (parts[..n - 2].join(":"), parts[n - 2], container_port),
    }
}

/// Unwrap a bracketed IPv6 literal and validate the host address.
fn parse_host_ip(raw_ip: &str) -> Result<String, String> {
    let ip = match raw_ip.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(inner) => inner,
        None if raw_ip.contains(':') => {
            return Err(format!("invalid ip address {}: too many colons", raw_ip));
        }
        None => raw_ip,
    };

    if !ip.is_empty() && ip.parse::<IpAddr>().is_err() {
        return Err(format!("invalid ip address: {}", ip));
    }
    Ok(ip.to_string())
}

/// Expand one publish spec into per-port mappings.
pub fn parse_port_spec(raw: &str) -> Result<Vec<PortMapping>, String> {
    let (raw_ip, host_port, container_port) = split_parts(raw);
    let (proto, container_port) = split_proto_port(container_port);

    let host_ip = parse_host_ip(&raw_ip)?;
    if container_port.is_empty() {
        return Err(format!("no port specified: {}<empty>", raw));
    }

    let (start, end) = parse_port_range(container_port)
        .map_err(|_| format!("invalid containerPort: {}", container_port))?;

    let (host_start, host_end) = if host_port.is_empty() {
        (0, 0)
    } else {
        parse_port_range(host_port).map_err(|_| format!("invalid hostPort: {}", host_port))?
    };

    // A host range against a single container port is a pool to allocate from.
    if !host_port.is_empty() && (end - start) != (host_end - host_start) && end != start {
        return Err(format!(
            "invalid ranges specified for container and host ports: {} and {}",
            container_port, host_port
        ));
    }

    let proto: Protocol = proto.parse()?;

    let mut mappings = Vec::with_capacity(usize::from(end - start) + 1);
    for offset in 0..=(end - start) {
        let mut binding_port = String::new();
        if !host_port.is_empty() {
            binding_port = (host_start + offset).to_string();
        }
        if start == end && host_start != host_end {
            binding_port = format!("{}-{}", binding_port, host_end);
        }

        mappings.push(PortMapping {
            port: PortKey::new(start + offset, proto),
            binding: PortBinding {
                host_ip: host_ip.clone(),
                host_port: binding_port,
            },
        });
    }
    Ok(mappings)
}

/// Exposed ports and host bindings for a list of publish specs.
pub fn parse_port_specs(
    specs: &[String],
) -> Result<(BTreeSet<PortKey>, BTreeMap<PortKey, Vec<PortBinding>>), ValidationError> {
    let mut exposed = BTreeSet::new();
    let mut bindings: BTreeMap<PortKey, Vec<PortBinding>> = BTreeMap::new();

    for spec in specs {
        let mappings =
            parse_port_spec(spec).map_err(|reason| ValidationError::new("publish", spec, reason))?;
        for mapping in mappings {
            exposed.insert(mapping.port);
            bindings.entry(mapping.port).or_default().push(mapping.binding);
        }
    }
    Ok((exposed, bindings))
}

/// Add `--expose` entries to `exposed`; already-present ports are kept as is.
pub fn parse_expose(entries: &[String], exposed: &mut BTreeSet<PortKey>) -> Result<(), ValidationError> {
    for entry in entries {
        if entry.contains(':') {
            return Err(ValidationError::new(
                "expose",
                entry,
                "invalid port format, host ports are not allowed",
            ));
        }

        let (proto, port) = split_proto_port(entry);
        let (start, end) = parse_port_range(port)
            .map_err(|e| ValidationError::new("expose", entry, format!("invalid range format: {}", e)))?;
        let proto: Protocol = proto
            .parse()
            .map_err(|reason: String| ValidationError::new("expose", entry, reason))?;

        for port in start..=end {
            exposed.insert(PortKey::new(port, proto));
        }
    }
    Ok(())
}
