//! Raw container specification to canonical configuration.
//!
//! [`translate`] is pure and deterministic: no I/O, no shared state. It
//! validates every knob of a [`RawSpec`] against the user-facing grammars and
//! either returns a complete [`CreateConfig`] or the first
//! [`ValidationError`] it hits. Nothing partial is ever returned.
//!
//! ## Grammars
//!
//! - [`units`]: human sizes (`100m`, `1.5GiB`)
//! - [`ports`]: `--publish` and `--expose`
//! - [`network`]: `--net` descriptors and network mode precedence
//! - [`device`]: `--device` and block IO device limits
//! - [`opts`]: labels, sysctls, disk quota, restart policy, security options
//!
//! ## Usage
//!
//! ```rust
//! use berth::translate::{translate, RawSpec};
//!
//! let spec = RawSpec {
//!     image: "busybox".to_string(),
//!     memory: "100m".to_string(),
//!     restart_policy: "on-failure:3".to_string(),
//!     ..Default::default()
//! };
//!
//! let config = translate(&spec).unwrap();
//! assert_eq!(config.host.resources.memory, 100 * 1024 * 1024);
//! assert_eq!(config.host.restart_policy.maximum_retry_count, 3);
//! ```

pub mod device;
pub mod network;
pub mod opts;
pub mod ports;
pub mod units;

use crate::container::{ContainerConfig, CreateConfig, HostConfig, Resources};
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A field of a [`RawSpec`] failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field} {value:?}: {reason}")]
pub struct ValidationError {
    /// User-facing field name (`memory`, `restart`, `publish`, ...)
    pub field: &'static str,
    /// Offending value as given
    pub value: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Untyped, user-supplied container description.
///
/// Every field defaults to "unset", so partial documents deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSpec {
    pub name: String,
    pub image: String,
    pub cmd: Vec<String>,
    /// `key=value` entries
    pub labels: Vec<String>,
    pub env: Vec<String>,
    /// Whitespace-separated entrypoint
    pub entrypoint: String,
    pub workdir: String,
    pub user: String,
    pub group_add: Vec<String>,
    pub hostname: String,
    pub tty: bool,
    /// Volume binds
    pub volumes: Vec<String>,
    pub runtime: String,

    // Resources
    pub cpu_shares: i64,
    pub cpuset_cpus: String,
    pub cpuset_mems: String,
    pub memory: String,
    pub memory_swap: String,
    pub memory_swappiness: i64,
    pub memory_wmark_ratio: i64,
    pub memory_extra: i64,
    pub memory_force_empty_ctl: i64,
    pub sche_lat_switch: i64,
    pub oom_kill_disable: bool,
    pub devices: Vec<String>,
    pub enable_lxcfs: bool,
    pub privileged: bool,
    pub blkio_weight: u16,
    pub blkio_weight_device: Vec<String>,
    pub blkio_device_read_bps: Vec<String>,
    pub blkio_device_write_bps: Vec<String>,
    pub blkio_device_read_iops: Vec<String>,
    pub blkio_device_write_iops: Vec<String>,
    pub intel_rdt_l3_cbm: String,
    pub cgroup_parent: String,

    pub restart_policy: String,
    pub ipc_mode: String,
    pub pid_mode: String,
    pub uts_mode: String,
    pub sysctls: Vec<String>,

    // Networking
    pub networks: Vec<String>,
    pub ports: Vec<String>,
    pub expose: Vec<String>,
    pub publish_all: bool,

    pub security_opt: Vec<String>,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub disk_quota: Vec<String>,
    pub oom_score_adj: i64,

    pub rich: bool,
    pub rich_mode: String,
    pub init_script: String,
}

impl Default for RawSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            image: String::new(),
            cmd: Vec::new(),
            labels: Vec::new(),
            env: Vec::new(),
            entrypoint: String::new(),
            workdir: String::new(),
            user: String::new(),
            group_add: Vec::new(),
            hostname: String::new(),
            tty: false,
            volumes: Vec::new(),
            runtime: String::new(),
            cpu_shares: 0,
            cpuset_cpus: String::new(),
            cpuset_mems: String::new(),
            memory: String::new(),
            memory_swap: String::new(),
            memory_swappiness: -1,
            memory_wmark_ratio: 0,
            memory_extra: 0,
            memory_force_empty_ctl: 0,
            sche_lat_switch: 0,
            oom_kill_disable: false,
            devices: Vec::new(),
            enable_lxcfs: false,
            privileged: false,
            blkio_weight: 0,
            blkio_weight_device: Vec::new(),
            blkio_device_read_bps: Vec::new(),
            blkio_device_write_bps: Vec::new(),
            blkio_device_read_iops: Vec::new(),
            blkio_device_write_iops: Vec::new(),
            intel_rdt_l3_cbm: String::new(),
            cgroup_parent: String::new(),
            restart_policy: String::new(),
            ipc_mode: String::new(),
            pid_mode: String::new(),
            uts_mode: String::new(),
            sysctls: Vec::new(),
            networks: Vec::new(),
            ports: Vec::new(),
            expose: Vec::new(),
            publish_all: false,
            security_opt: Vec::new(),
            cap_add: Vec::new(),
            cap_drop: Vec::new(),
            disk_quota: Vec::new(),
            oom_score_adj: 0,
            rich: false,
            rich_mode: String::new(),
            init_script: String::new(),
        }
    }
}

/// Validate `spec` and build its canonical configuration.
///
/// Fails on the first invalid field.
pub fn translate(spec: &RawSpec) -> Result<CreateConfig, ValidationError> {
    let labels = opts::parse_labels(&spec.labels)?;
    let disk_quota = opts::parse_disk_quota(&spec.disk_quota)?;

    let resources = translate_resources(spec)?;
    let restart_policy = opts::parse_restart_policy(&spec.restart_policy)?;
    let sysctls = opts::parse_sysctls(&spec.sysctls)?;
    let oom_score_adj = opts::validate_oom_score_adj(spec.oom_score_adj)?;
    let profiles = opts::parse_security_opts(&spec.security_opt)?;

    let (network_mode, networking) = network::parse_networks(&spec.networks)?;
    let (mut exposed_ports, port_bindings) = ports::parse_port_specs(&spec.ports)?;
    ports::parse_expose(&spec.expose, &mut exposed_ports)?;

    let container = ContainerConfig {
        image: spec.image.clone(),
        cmd: spec.cmd.clone(),
        entrypoint: spec.entrypoint.split_whitespace().map(str::to_string).collect(),
        env: spec.env.clone(),
        working_dir: spec.workdir.clone(),
        user: spec.user.clone(),
        hostname: spec.hostname.clone(),
        tty: spec.tty,
        labels,
        exposed_ports,
        disk_quota,
        rich: spec.rich,
        rich_mode: spec.rich_mode.clone(),
        init_script: spec.init_script.clone(),
    };

    let host = HostConfig {
        binds: spec.volumes.clone(),
        runtime: spec.runtime.clone(),
        resources,
        enable_lxcfs: spec.enable_lxcfs,
        privileged: spec.privileged,
        restart_policy,
        ipc_mode: spec.ipc_mode.clone(),
        pid_mode: spec.pid_mode.clone(),
        uts_mode: spec.uts_mode.clone(),
        group_add: spec.group_add.clone(),
        sysctls,
        security_opt: spec.security_opt.clone(),
        apparmor_profile: profiles.apparmor,
        seccomp_profile: profiles.seccomp,
        network_mode,
        cap_add: spec.cap_add.clone(),
        cap_drop: spec.cap_drop.clone(),
        port_bindings,
        publish_all_ports: spec.publish_all,
        oom_score_adj,
    };

    debug!(
        "Translated spec for image {} (network mode {}, {} exposed ports)",
        container.image,
        host.network_mode,
        container.exposed_ports.len()
    );

    Ok(CreateConfig {
        container,
        host,
        networking,
    })
}

fn translate_resources(spec: &RawSpec) -> Result<Resources, ValidationError> {
    Ok(Resources {
        cpu_shares: spec.cpu_shares,
        cpuset_cpus: spec.cpuset_cpus.clone(),
        cpuset_mems: spec.cpuset_mems.clone(),
        devices: device::parse_devices(&spec.devices)?,
        memory: units::parse_memory(&spec.memory)?,
        memory_swap: units::parse_memory_swap(&spec.memory_swap)?,
        memory_swappiness: opts::validate_memory_swappiness(spec.memory_swappiness)?,
        memory_wmark_ratio: opts::validate_memory_wmark_ratio(spec.memory_wmark_ratio)?,
        memory_extra: spec.memory_extra,
        memory_force_empty_ctl: spec.memory_force_empty_ctl,
        sche_lat_switch: spec.sche_lat_switch,
        oom_kill_disable: spec.oom_kill_disable,
        blkio_weight: device::validate_blkio_weight(spec.blkio_weight)?,
        blkio_weight_device: device::parse_weight_devices(&spec.blkio_weight_device)?,
        blkio_device_read_bps: device::parse_throttle_bps(
            "device-read-bps",
            &spec.blkio_device_read_bps,
        )?,
        blkio_device_write_bps: device::parse_throttle_bps(
            "device-write-bps",
            &spec.blkio_device_write_bps,
        )?,
        blkio_device_read_iops: device::parse_throttle_iops(
            "device-read-iops",
            &spec.blkio_device_read_iops,
        )?,
        blkio_device_write_iops: device::parse_throttle_iops(
            "device-write-iops",
            &spec.blkio_device_write_iops,
        )?,
        intel_rdt_l3_cbm: spec.intel_rdt_l3_cbm.clone(),
        cgroup_parent: spec.cgroup_parent.clone(),
    })
}

#[cfg(test)]
mod tests;
