//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./berth.toml or ./.berth/config.toml
//! 2. User config: ~/.berth/config.toml
//! 3. System config: /etc/berth/config.toml
//! 4. Built-in defaults
//!
//! Command line overrides (`--config`, `--root`, `--backend`) are applied last.

use super::args::EngineOverrides;
use crate::{EngineConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<EngineConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return EngineConfig::from_toml_file(&config_path)
                .with_context(|| format!("Invalid configuration in {:?}", config_path));
        }

        info!("No configuration file found, using defaults");
        Ok(EngineConfig::default())
    }

    /// Load the explicit `--config` file or discover one, then apply overrides.
    pub fn resolve(overrides: &EngineOverrides) -> Result<EngineConfig> {
        let mut config = match &overrides.config {
            Some(path) => EngineConfig::from_toml_file(path)
                .with_context(|| format!("Invalid configuration in {:?}", path))?,
            None => Self::discover_config()?,
        };

        if let Some(root) = &overrides.root {
            config.store.base_dir = env::meta_dir_path(root);
        }
        if let Some(backend) = &overrides.backend {
            config.store.backend = backend.clone();
        }
        Ok(config)
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(Self::get_config_candidates())
    }

    fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = Self::get_home_dir();
        Self::candidates_for(current_dir.as_deref(), home_dir.as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .filter(|home| !home.is_empty())
            .map(PathBuf::from)
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;

        let config_dir = env::user_config_dir_path(&home_dir);
        let config_path = env::user_config_file_path(&home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).with_context(|| {
                format!("Failed to create configuration directory {:?}", config_dir)
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            EngineConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_candidates_order() {
        let candidates = ConfigDiscovery::candidates_for(
            Some(Path::new("/work")),
            Some(Path::new("/home/user")),
        );

        assert_eq!(candidates[0], PathBuf::from("/work/berth.toml"));
        assert_eq!(candidates[1], PathBuf::from("/work/.berth/config.toml"));
        assert_eq!(candidates[2], PathBuf::from("/home/user/.berth/config.toml"));
        #[cfg(unix)]
        assert_eq!(candidates[3], PathBuf::from("/etc/berth/config.toml"));
    }

    #[test]
    fn test_config_candidates_without_home() {
        let candidates = ConfigDiscovery::candidates_for(Some(Path::new("/work")), None);
        assert!(
            !candidates
                .iter()
                .any(|c| c.starts_with("/home"))
        );
        assert_eq!(candidates[0].file_name().unwrap(), "berth.toml");
    }

    #[test]
    fn test_local_file_shadows_user_file() {
        let work = TempDir::new().unwrap();
        let home = TempDir::new().unwrap();

        let user_config = env::user_config_file_path(home.path());
        fs::create_dir_all(user_config.parent().unwrap()).unwrap();
        EngineConfig::default().to_toml_file(&user_config).unwrap();

        let candidates = ConfigDiscovery::candidates_for(Some(work.path()), Some(home.path()));
        assert_eq!(
            ConfigDiscovery::first_existing(candidates.clone()),
            Some(user_config.clone())
        );

        let local_config = work.path().join(env::LOCAL_CONFIG_FILE_NAME);
        EngineConfig::default().to_toml_file(&local_config).unwrap();
        assert_eq!(
            ConfigDiscovery::first_existing(candidates),
            Some(local_config)
        );
    }

    #[test]
    fn test_directory_is_not_a_config_file() {
        let work = TempDir::new().unwrap();
        fs::create_dir(work.path().join(env::LOCAL_CONFIG_FILE_NAME)).unwrap();

        let candidates = vec![work.path().join(env::LOCAL_CONFIG_FILE_NAME)];
        assert_eq!(ConfigDiscovery::first_existing(candidates), None);
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("engine.toml");
        std::fs::write(
            &config_path,
            r#"
            log_filter = "berth=debug"

            [registry]
            max_id_attempts = 4
            "#,
        )
        .unwrap();

        let overrides = EngineOverrides {
            config: Some(config_path),
            root: Some(PathBuf::from("/srv/berth")),
            backend: Some("memory".to_string()),
            verbose: false,
        };
        let config = ConfigDiscovery::resolve(&overrides).unwrap();

        assert_eq!(config.log_filter, "berth=debug");
        assert_eq!(config.registry.max_id_attempts, 4);
        assert_eq!(config.store.base_dir, PathBuf::from("/srv/berth/containers"));
        assert_eq!(config.store.backend, "memory");
    }

    #[test]
    fn test_resolve_reports_bad_explicit_config() {
        let overrides = EngineOverrides {
            config: Some(PathBuf::from("/nonexistent/berth.toml")),
            ..Default::default()
        };
        let err = ConfigDiscovery::resolve(&overrides).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to read config file"));
    }
}
