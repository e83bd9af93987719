//! Environment constants and path utilities for the engine.
//!
//! This module centralizes the hardcoded paths, bucket names and limits used
//! throughout the crate, making them easier to maintain and modify.

use std::path::{Path, PathBuf};

/// Main per-user directory name (hidden directory like .git, .vscode)
pub const BERTH_DIR_NAME: &str = ".berth";

/// Configuration file name inside a `.berth` directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name looked up in the current directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "berth.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/berth/config.toml";

/// Default engine root when nothing else is configured
pub const DEFAULT_ROOT_DIR: &str = "/var/lib/berth";

/// Default tracing filter directive
pub const DEFAULT_LOG_FILTER: &str = "berth=info";

/// Metadata store constants
pub mod store {
    /// Backend used when the configuration does not name one
    pub const DEFAULT_BACKEND: &str = "local";

    /// In-memory backend name
    pub const MEMORY_BACKEND: &str = "memory";

    /// Directory under the engine root holding the metadata store
    pub const META_DIR_NAME: &str = "containers";

    /// Extension of per-bucket object files written by the local backend
    pub const OBJECT_FILE_EXTENSION: &str = "json";

    /// Bucket holding container metadata objects
    pub const CONTAINERS_BUCKET: &str = "containers";

    /// Bucket holding volume metadata objects
    pub const VOLUMES_BUCKET: &str = "volumes";
}

/// Identity generation constants
pub mod identity {
    /// Length of a full container ID (hex characters)
    pub const ID_LENGTH: usize = 64;

    /// Length of the abbreviated ID shown to users
    pub const SHORT_ID_LENGTH: usize = 12;

    /// Length of generated container names
    pub const GENERATED_NAME_LENGTH: usize = 6;

    /// Upper bound on ID generation retries before giving up
    pub const MAX_ID_ATTEMPTS: u32 = 32;
}

/// Build the user-level `.berth` directory path from a home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    home_dir.join(BERTH_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(BERTH_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Build the metadata store directory from an engine root
pub fn meta_dir_path(root_dir: &Path) -> PathBuf {
    root_dir.join(store::META_DIR_NAME)
}

/// Abbreviate a full ID for display
pub fn short_id(id: &str) -> &str {
    id.get(..identity::SHORT_ID_LENGTH).unwrap_or(id)
}
