//! Canonical container configuration.
//!
//! These are the strongly-typed values produced by
//! [`translate`](crate::translate::translate). Once built they are never
//! mutated; everything downstream (registry, runtime) reads them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Complete create-time configuration of one container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateConfig {
    /// Portable, host-independent settings
    pub container: ContainerConfig,
    /// Host-dependent settings
    pub host: HostConfig,
    /// Per-network endpoint settings
    pub networking: NetworkingConfig,
}

/// Portable container settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Image reference
    pub image: String,
    /// Command to run
    pub cmd: Vec<String>,
    /// Entrypoint, already split on whitespace
    pub entrypoint: Vec<String>,
    /// Environment variables (`KEY=value`)
    pub env: Vec<String>,
    /// Working directory
    pub working_dir: String,
    /// User to run as
    pub user: String,
    /// Container hostname
    pub hostname: String,
    /// Allocate a TTY
    pub tty: bool,
    /// Labels
    pub labels: BTreeMap<String, String>,
    /// Exposed ports
    pub exposed_ports: BTreeSet<PortKey>,
    /// Disk quota per mount path
    pub disk_quota: BTreeMap<String, String>,
    /// Rich container mode
    pub rich: bool,
    pub rich_mode: String,
    pub init_script: String,
}

/// Host-dependent container settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Volume binds (`src:dst[:mode]`)
    pub binds: Vec<String>,
    /// OCI runtime name
    pub runtime: String,
    pub resources: Resources,
    pub enable_lxcfs: bool,
    pub privileged: bool,
    pub restart_policy: RestartPolicy,
    pub ipc_mode: String,
    pub pid_mode: String,
    pub uts_mode: String,
    pub group_add: Vec<String>,
    pub sysctls: BTreeMap<String, String>,
    /// Raw security options as given
    pub security_opt: Vec<String>,
    /// Parsed `apparmor=` profile
    pub apparmor_profile: Option<String>,
    /// Parsed `seccomp=` profile
    pub seccomp_profile: Option<String>,
    pub network_mode: NetworkMode,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub port_bindings: BTreeMap<PortKey, Vec<PortBinding>>,
    pub publish_all_ports: bool,
    pub oom_score_adj: i64,
}

/// Cgroup resource settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_shares: i64,
    pub cpuset_cpus: String,
    pub cpuset_mems: String,
    pub devices: Vec<DeviceMapping>,
    /// Memory limit in bytes (0 = unset)
    pub memory: i64,
    /// Memory + swap limit in bytes (0 = unset, -1 = unlimited)
    pub memory_swap: i64,
    /// -1 means "inherit"
    pub memory_swappiness: i64,
    pub memory_wmark_ratio: i64,
    pub memory_extra: i64,
    pub memory_force_empty_ctl: i64,
    pub sche_lat_switch: i64,
    pub oom_kill_disable: bool,
    pub blkio_weight: u16,
    pub blkio_weight_device: Vec<WeightDevice>,
    pub blkio_device_read_bps: Vec<ThrottleDevice>,
    pub blkio_device_write_bps: Vec<ThrottleDevice>,
    pub blkio_device_read_iops: Vec<ThrottleDevice>,
    pub blkio_device_write_iops: Vec<ThrottleDevice>,
    pub intel_rdt_l3_cbm: String,
    pub cgroup_parent: String,
}

/// Host device exposed inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMapping {
    pub path_on_host: String,
    pub path_in_container: String,
    /// Combination of `r`, `w`, `m`
    pub cgroup_permissions: String,
}

/// Relative block IO weight for one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightDevice {
    pub path: String,
    pub weight: u16,
}

/// Block IO rate limit for one device (bytes or operations per second).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleDevice {
    pub path: String,
    pub rate: u64,
}

/// Restart policy names accepted on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicyName {
    /// Never restart.
    #[default]
    No,
    /// Always restart.
    Always,
    /// Restart unless explicitly stopped.
    UnlessStopped,
    /// Restart on non-zero exit.
    OnFailure,
}

impl RestartPolicyName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::No => "no",
            Self::Always => "always",
            Self::UnlessStopped => "unless-stopped",
            Self::OnFailure => "on-failure",
        }
    }
}

impl FromStr for RestartPolicyName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no" => Ok(Self::No),
            "always" => Ok(Self::Always),
            "unless-stopped" => Ok(Self::UnlessStopped),
            "on-failure" => Ok(Self::OnFailure),
            other => Err(format!("unknown restart policy {}", other)),
        }
    }
}

impl fmt::Display for RestartPolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Restart policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub name: RestartPolicyName,
    /// Only meaningful for `on-failure`; 0 means retry forever
    pub maximum_retry_count: i64,
}

/// Container network mode.
///
/// Serialized as its string form (`bridge`, `host`, `container:<ref>`, or the
/// network name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum NetworkMode {
    /// Default bridge network
    #[default]
    Bridge,
    /// Host network namespace
    Host,
    /// Join another container's network namespace
    Container(String),
    /// User-defined network
    Named(String),
}

impl NetworkMode {
    /// Classify a network name.
    pub fn from_name(name: &str) -> Self {
        match name {
            "bridge" => Self::Bridge,
            "host" => Self::Host,
            other => match other.strip_prefix("container:") {
                Some(target) => Self::Container(target.to_string()),
                None => Self::Named(other.to_string()),
            },
        }
    }

    /// Target container reference for `container:` mode.
    pub fn container_ref(&self) -> Option<&str> {
        match self {
            Self::Container(target) => Some(target),
            _ => None,
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bridge => f.write_str("bridge"),
            Self::Host => f.write_str("host"),
            Self::Container(target) => write!(f, "container:{}", target),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<NetworkMode> for String {
    fn from(mode: NetworkMode) -> Self {
        mode.to_string()
    }
}

impl From<String> for NetworkMode {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

/// Transport protocol of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Sctp => "sctp",
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    /// Protocol names are matched case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            "sctp" => Ok(Self::Sctp),
            _ => Err(format!("invalid proto: {}", s)),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical `port/proto` key.
///
/// Serialized as the string `"80/tcp"`, so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PortKey {
    pub port: u16,
    pub proto: Protocol,
}

impl PortKey {
    pub fn new(port: u16, proto: Protocol) -> Self {
        Self { port, proto }
    }

    pub fn tcp(port: u16) -> Self {
        Self::new(port, Protocol::Tcp)
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.port, self.proto)
    }
}

impl FromStr for PortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, proto) = s.split_once('/').unwrap_or((s, "tcp"));
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port {}: {}", port, e))?;
        Ok(Self::new(port, proto.parse()?))
    }
}

impl From<PortKey> for String {
    fn from(key: PortKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for PortKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Host side of a published port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Empty binds every interface
    pub host_ip: String,
    /// Port, port range, or empty for a dynamic port
    pub host_port: String,
}

/// Per-network endpoint settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkingConfig {
    pub endpoints: BTreeMap<String, EndpointSettings>,
}

/// Static addressing for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub ip_address: String,
    pub ipam: EndpointIpamConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointIpamConfig {
    pub ipv4_address: String,
    pub ipv6_address: String,
}
