//! CLI-specific functionality for the `berth` binary
//!
//! This module contains all CLI-related code including argument parsing,
//! spec file loading, and configuration discovery.

pub mod args;
pub mod config;

pub use args::{Args, CreateRequest, EngineOverrides, ExecutionMode, SpecFormat};
pub use config::ConfigDiscovery;
