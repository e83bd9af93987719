//! Persisted container metadata.

use super::CreateConfig;
use crate::env;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lifecycle status recorded on a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    #[default]
    Created,
    Running,
    Paused,
    Restarting,
    Stopped,
    Exited,
    Dead,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Stopped => "stopped",
            Self::Exited => "exited",
            Self::Dead => "dead",
        };
        f.write_str(status)
    }
}

/// Runtime state; written by the supervisor, only initialised here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    pub status: ContainerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: i64,
    pub pid: i64,
}

/// The persisted record of one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMeta {
    /// Stable, never reused
    pub id: String,
    /// Unique among live containers
    pub name: String,
    pub config: CreateConfig,
    pub state: ContainerState,
    pub created: DateTime<Utc>,
    /// Store location of this container's directory
    pub base_path: PathBuf,
}

impl ContainerMeta {
    pub fn new(id: String, name: String, config: CreateConfig, base_path: PathBuf) -> Self {
        Self {
            id,
            name,
            config,
            state: ContainerState::default(),
            created: Utc::now(),
            base_path,
        }
    }

    pub fn short_id(&self) -> &str {
        env::short_id(&self.id)
    }

    pub fn image(&self) -> &str {
        &self.config.container.image
    }
}
