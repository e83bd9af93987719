//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `create`: Translate a container spec and register the container
//! - `inspect`: Print the stored metadata of one or more containers
//! - `ls`: List registered containers
//! - `rm`: Remove containers
//! - `rename`: Give a container a new name
//! - `show-config`: Show configuration discovery information

use crate::translate::RawSpec;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ExecutionMode {
    Create(CreateRequest),
    Inspect { tokens: Vec<String> },
    List { quiet: bool },
    Remove { tokens: Vec<String> },
    Rename { token: String, new_name: String },
    ShowConfig { init: bool },
}

/// Engine settings given on the command line, layered over the discovered config.
#[derive(Debug, Clone, Default)]
pub struct EngineOverrides {
    pub config: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub backend: Option<String>,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct CreateRequest {
    /// Spec assembled from flags
    pub spec: RawSpec,
    /// JSON or TOML spec file used as the base
    pub spec_file: Option<PathBuf>,
}

/// Spec file encodings, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Toml,
}

impl SpecFormat {
    /// Extension matching is case-insensitive
    pub fn detect(path: &Path) -> Result<Self, String> {
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(format!(
                "unsupported spec file extension {:?} (expected .json or .toml)",
                other
            )),
        }
    }
}

impl CreateRequest {
    /// Final spec: the file (if any) with `--name`, image and command from the
    /// command line taking precedence.
    pub fn resolve_spec(&self) -> anyhow::Result<RawSpec> {
        let Some(path) = &self.spec_file else {
            return Ok(self.spec.clone());
        };

        let format = SpecFormat::detect(path).map_err(anyhow::Error::msg)?;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read spec file {:?}", path))?;
        let mut spec: RawSpec = match format {
            SpecFormat::Json => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON spec {:?}", path))?,
            SpecFormat::Toml => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML spec {:?}", path))?,
        };

        if !self.spec.name.is_empty() {
            spec.name = self.spec.name.clone();
        }
        if !self.spec.image.is_empty() {
            spec.image = self.spec.image.clone();
        }
        if !self.spec.cmd.is_empty() {
            spec.cmd = self.spec.cmd.clone();
        }
        if spec.image.is_empty() && spec.name.is_empty() {
            bail!("spec file {:?} names neither an image nor a container", path);
        }
        Ok(spec)
    }
}

#[derive(Debug, Parser)]
#[command(name = "berth")]
#[command(author = "Berth Engine Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Container identity and configuration core")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Engine root directory (metadata lives in <root>/containers)
    #[arg(long = "root", global = true)]
    pub root: Option<PathBuf>,
    /// Store backend name
    #[arg(long = "backend", global = true)]
    pub backend: Option<String>,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a container from flags or a spec file
    Create(CreateArgs),
    /// Display detailed information on one or more containers
    Inspect {
        /// Container name, ID or ID prefix
        #[arg(required = true)]
        containers: Vec<String>,
    },
    /// List containers
    #[command(alias = "ps")]
    Ls {
        /// Only display container IDs
        #[arg(short = 'q', long = "quiet")]
        quiet: bool,
    },
    /// Remove one or more containers
    Rm {
        /// Container name, ID or ID prefix
        #[arg(required = true)]
        containers: Vec<String>,
    },
    /// Rename a container
    Rename {
        /// Container name, ID or ID prefix
        container: String,
        /// New name
        new_name: String,
    },
    /// Show configuration discovery information
    ShowConfig {
        /// Write a default user configuration if none exists
        #[arg(long = "init")]
        init: bool,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct CreateArgs {
    /// Image to create the container from
    pub image: Option<String>,
    /// Command to run
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub cmd: Vec<String>,

    /// JSON or TOML spec file used as the base spec
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub spec_file: Option<PathBuf>,
    /// Assign a name to the container
    #[arg(long)]
    pub name: Option<String>,
    /// Set metadata (key=value)
    #[arg(short = 'l', long = "label")]
    pub labels: Vec<String>,
    /// Set environment variables
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,
    /// Overwrite the default entrypoint of the image
    #[arg(long)]
    pub entrypoint: Option<String>,
    /// Working directory inside the container
    #[arg(short = 'w', long = "workdir")]
    pub workdir: Option<String>,
    /// Username or UID
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,
    /// Additional groups to join
    #[arg(long = "group-add")]
    pub group_add: Vec<String>,
    /// Container host name
    #[arg(long)]
    pub hostname: Option<String>,
    /// Allocate a pseudo-TTY
    #[arg(short = 't', long = "tty")]
    pub tty: bool,
    /// Bind mount a volume
    #[arg(long = "volume")]
    pub volumes: Vec<String>,
    /// Runtime to use for this container
    #[arg(long)]
    pub runtime: Option<String>,

    /// CPU shares (relative weight)
    #[arg(long = "cpu-shares", default_value_t = 0)]
    pub cpu_shares: i64,
    /// CPUs in which to allow execution (0-3, 0,1)
    #[arg(long = "cpuset-cpus")]
    pub cpuset_cpus: Option<String>,
    /// MEMs in which to allow execution (0-3, 0,1)
    #[arg(long = "cpuset-mems")]
    pub cpuset_mems: Option<String>,
    /// Memory limit
    #[arg(short = 'm', long)]
    pub memory: Option<String>,
    /// Swap limit equal to memory plus swap: -1 to enable unlimited swap
    #[arg(long = "memory-swap", allow_hyphen_values = true)]
    pub memory_swap: Option<String>,
    /// Tune container memory swappiness (0 to 100)
    #[arg(long = "memory-swappiness", default_value_t = -1, allow_negative_numbers = true)]
    pub memory_swappiness: i64,
    /// Memory watermark ratio (0 to 100)
    #[arg(long = "memory-wmark-ratio", default_value_t = 0)]
    pub memory_wmark_ratio: i64,
    /// Extra memory allowance percentage
    #[arg(long = "memory-extra", default_value_t = 0)]
    pub memory_extra: i64,
    /// Force empty memory on cgroup removal
    #[arg(long = "memory-force-empty-ctl", default_value_t = 0)]
    pub memory_force_empty_ctl: i64,
    /// Scheduler latency switch
    #[arg(long = "sche-lat-switch", default_value_t = 0)]
    pub sche_lat_switch: i64,
    /// Disable OOM Killer
    #[arg(long = "oom-kill-disable")]
    pub oom_kill_disable: bool,
    /// Add a host device to the container
    #[arg(long = "device")]
    pub devices: Vec<String>,
    /// Enable lxcfs for the container
    #[arg(long = "enable-lxcfs")]
    pub enable_lxcfs: bool,
    /// Give extended privileges to this container
    #[arg(long)]
    pub privileged: bool,
    /// Block IO weight (10 to 1000, 0 to disable)
    #[arg(long = "blkio-weight", default_value_t = 0)]
    pub blkio_weight: u16,
    /// Block IO weight per device (/dev/sda:500)
    #[arg(long = "blkio-weight-device")]
    pub blkio_weight_device: Vec<String>,
    /// Limit read rate from a device (/dev/sda:1mb)
    #[arg(long = "device-read-bps")]
    pub device_read_bps: Vec<String>,
    /// Limit write rate to a device (/dev/sda:1mb)
    #[arg(long = "device-write-bps")]
    pub device_write_bps: Vec<String>,
    /// Limit read rate (IO per second) from a device
    #[arg(long = "device-read-iops")]
    pub device_read_iops: Vec<String>,
    /// Limit write rate (IO per second) to a device
    #[arg(long = "device-write-iops")]
    pub device_write_iops: Vec<String>,
    /// Intel RDT L3 cache bitmask
    #[arg(long = "intel-rdt-l3-cbm")]
    pub intel_rdt_l3_cbm: Option<String>,
    /// Optional parent cgroup for the container
    #[arg(long = "cgroup-parent")]
    pub cgroup_parent: Option<String>,

    /// Restart policy (no, always, unless-stopped, on-failure[:max-retry])
    #[arg(long)]
    pub restart: Option<String>,
    /// IPC namespace to use
    #[arg(long)]
    pub ipc: Option<String>,
    /// PID namespace to use
    #[arg(long)]
    pub pid: Option<String>,
    /// UTS namespace to use
    #[arg(long)]
    pub uts: Option<String>,
    /// Sysctl options (key=value)
    #[arg(long = "sysctl")]
    pub sysctls: Vec<String>,

    /// Connect a container to a network (name[:ip[:mode]], host, container:<ref>)
    #[arg(long = "net", alias = "network")]
    pub networks: Vec<String>,
    /// Publish a container's port(s) to the host
    #[arg(short = 'p', long = "publish")]
    pub ports: Vec<String>,
    /// Expose a port or a range of ports
    #[arg(long = "expose")]
    pub expose: Vec<String>,
    /// Publish all exposed ports to random ports
    #[arg(short = 'P', long = "publish-all")]
    pub publish_all: bool,

    /// Security options (apparmor=PROFILE, seccomp=PROFILE)
    #[arg(long = "security-opt")]
    pub security_opt: Vec<String>,
    /// Add Linux capabilities
    #[arg(long = "cap-add")]
    pub cap_add: Vec<String>,
    /// Drop Linux capabilities
    #[arg(long = "cap-drop")]
    pub cap_drop: Vec<String>,
    /// Disk quota per path (/data=10g, or a bare size for the root filesystem)
    #[arg(long = "disk-quota")]
    pub disk_quota: Vec<String>,
    /// Tune host's OOM preferences (-1000 to 1000)
    #[arg(long = "oom-score-adj", default_value_t = 0, allow_negative_numbers = true)]
    pub oom_score_adj: i64,

    /// Run as a rich container
    #[arg(long)]
    pub rich: bool,
    /// Rich container init mode
    #[arg(long = "rich-mode")]
    pub rich_mode: Option<String>,
    /// Script run before the rich container init
    #[arg(long = "initscript")]
    pub init_script: Option<String>,
}

impl CreateArgs {
    /// Map flags onto a [`RawSpec`]; unset options keep the spec defaults.
    pub fn to_raw_spec(&self) -> RawSpec {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        RawSpec {
            name: text(&self.name),
            image: text(&self.image),
            cmd: self.cmd.clone(),
            labels: self.labels.clone(),
            env: self.env.clone(),
            entrypoint: text(&self.entrypoint),
            workdir: text(&self.workdir),
            user: text(&self.user),
            group_add: self.group_add.clone(),
            hostname: text(&self.hostname),
            tty: self.tty,
            volumes: self.volumes.clone(),
            runtime: text(&self.runtime),
            cpu_shares: self.cpu_shares,
            cpuset_cpus: text(&self.cpuset_cpus),
            cpuset_mems: text(&self.cpuset_mems),
            memory: text(&self.memory),
            memory_swap: text(&self.memory_swap),
            memory_swappiness: self.memory_swappiness,
            memory_wmark_ratio: self.memory_wmark_ratio,
            memory_extra: self.memory_extra,
            memory_force_empty_ctl: self.memory_force_empty_ctl,
            sche_lat_switch: self.sche_lat_switch,
            oom_kill_disable: self.oom_kill_disable,
            devices: self.devices.clone(),
            enable_lxcfs: self.enable_lxcfs,
            privileged: self.privileged,
            blkio_weight: self.blkio_weight,
            blkio_weight_device: self.blkio_weight_device.clone(),
            blkio_device_read_bps: self.device_read_bps.clone(),
            blkio_device_write_bps: self.device_write_bps.clone(),
            blkio_device_read_iops: self.device_read_iops.clone(),
            blkio_device_write_iops: self.device_write_iops.clone(),
            intel_rdt_l3_cbm: text(&self.intel_rdt_l3_cbm),
            cgroup_parent: text(&self.cgroup_parent),
            restart_policy: text(&self.restart),
            ipc_mode: text(&self.ipc),
            pid_mode: text(&self.pid),
            uts_mode: text(&self.uts),
            sysctls: self.sysctls.clone(),
            networks: self.networks.clone(),
            ports: self.ports.clone(),
            expose: self.expose.clone(),
            publish_all: self.publish_all,
            security_opt: self.security_opt.clone(),
            cap_add: self.cap_add.clone(),
            cap_drop: self.cap_drop.clone(),
            disk_quota: self.disk_quota.clone(),
            oom_score_adj: self.oom_score_adj,
            rich: self.rich,
            rich_mode: text(&self.rich_mode),
            init_script: text(&self.init_script),
        }
    }
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn overrides(&self) -> EngineOverrides {
        EngineOverrides {
            config: self.config.clone(),
            root: self.root.clone(),
            backend: self.backend.clone(),
            verbose: self.verbose,
        }
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Create(create)) => {
                if create.spec_file.is_none() && create.image.is_none() {
                    return Err("create requires an image or --file".to_string());
                }
                if let Some(path) = &create.spec_file {
                    SpecFormat::detect(path)?;
                }
                Ok(ExecutionMode::Create(CreateRequest {
                    spec: create.to_raw_spec(),
                    spec_file: create.spec_file.clone(),
                }))
            }
            Some(Commands::Inspect { containers }) => Ok(ExecutionMode::Inspect {
                tokens: containers.clone(),
            }),
            Some(Commands::Ls { quiet }) => Ok(ExecutionMode::List { quiet: *quiet }),
            Some(Commands::Rm { containers }) => Ok(ExecutionMode::Remove {
                tokens: containers.clone(),
            }),
            Some(Commands::Rename {
                container,
                new_name,
            }) => Ok(ExecutionMode::Rename {
                token: container.clone(),
                new_name: new_name.clone(),
            }),
            Some(Commands::ShowConfig { init }) => Ok(ExecutionMode::ShowConfig { init: *init }),
            None => Err(
                "No command specified. Use 'berth --help' to see available commands.".to_string(),
            ),
        }
    }
}
