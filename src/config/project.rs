//! Project configuration
//!
//! Loads project-specific configuration from .worktree-view/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::git::{discover_root, DEFAULT_GIT_PROGRAM};

/// Configuration file location inside a workspace
pub const CONFIG_DIR: &str = ".worktree-view";
pub const CONFIG_FILE: &str = "config.toml";

/// Defaults for the host bridge listener
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9000;

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How worktree entries are labelled in the tree
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Label an entry with its directory name when its relative path is empty
    #[serde(default)]
    pub basename_fallback: bool,
}

/// Host bridge listener settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_git_program() -> String {
    DEFAULT_GIT_PROGRAM.to_string()
}

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Workspace folder to list, used when none is given on the command line.
    /// Relative paths are resolved against the config file's directory.
    pub workspace: Option<PathBuf>,
    /// Git executable to run
    #[serde(default = "default_git_program")]
    pub git_program: String,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            git_program: default_git_program(),
            display: DisplayConfig::default(),
            server: ServerSettings::default(),
        }
    }
}

impl ProjectConfig {
    /// Load configuration from a project directory
    ///
    /// A missing config file yields the defaults.
    pub fn load(project_path: &Path) -> Result<Self, ConfigError> {
        let config_path = project_path.join(CONFIG_DIR).join(CONFIG_FILE);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        Self::load_file(&config_path)
    }

    /// Load configuration for a workspace location
    ///
    /// Inside a repository the file is read from the repository root, so a
    /// subdirectory sees the same configuration as the root.
    pub fn load_for_location(location: &Path) -> Result<Self, ConfigError> {
        let project_path = discover_root(location).unwrap_or_else(|| location.to_path_buf());
        Self::load(&project_path)
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ProjectConfig = toml::from_str(&content)?;

        if let (Some(workspace), Some(dir)) = (config.workspace.as_mut(), path.parent()) {
            if workspace.is_relative() {
                *workspace = dir.join(&*workspace);
            }
        }
        Ok(config)
    }
}
