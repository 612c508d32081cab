//! Configuration handling for colyn
//!
//! Project settings live in `<root>/.colyn/config.toml`; the allocation
//! high-water mark lives next to them in `state.toml`.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ColynError;

/// Name of the project marker directory
pub const CONFIG_DIR_NAME: &str = ".colyn";

/// Name of the directory holding all task worktrees
pub const WORKTREES_DIR_NAME: &str = "worktrees";

const CONFIG_FILE_NAME: &str = "config.toml";
const STATE_FILE_NAME: &str = "state.toml";

/// Colyn configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Colyn-specific settings
    #[serde(default)]
    pub colyn: ColynConfig,
}

/// How `update` brings a worktree up to the main branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    #[default]
    Rebase,
    Merge,
}

impl std::fmt::Display for UpdateStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStrategy::Rebase => write!(f, "rebase"),
            UpdateStrategy::Merge => write!(f, "merge"),
        }
    }
}

/// Core colyn settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColynConfig {
    /// Main checkout directory name (defaults to the root's basename)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_dir: Option<String>,

    /// Per-worktree environment file name
    #[serde(default = "default_env_file")]
    pub env_file: String,

    /// Port used for main when its environment file has none
    #[serde(default = "default_port")]
    pub default_port: u16,

    /// Default strategy for `update`
    #[serde(default)]
    pub update_strategy: UpdateStrategy,
}

fn default_env_file() -> String {
    ".env.local".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ColynConfig {
    fn default() -> Self {
        Self {
            main_dir: None,
            env_file: default_env_file(),
            default_port: default_port(),
            update_strategy: UpdateStrategy::default(),
        }
    }
}

impl Config {
    /// Load `config.toml` from a `.colyn` directory; a missing file yields defaults
    pub fn load(config_dir: &Path) -> Result<Config, ColynError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content)
            .map_err(|e| ColynError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write `config.toml` into a `.colyn` directory
    pub fn save(&self, config_dir: &Path) -> Result<(), ColynError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ColynError::Config(e.to_string()))?;
        fs::write(config_dir.join(CONFIG_FILE_NAME), content)?;
        Ok(())
    }
}

/// Allocation bookkeeping persisted across invocations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AllocationState {
    /// Highest worktree ID ever handed out in this project
    #[serde(default)]
    pub last_worktree_id: u32,
}

impl AllocationState {
    /// Read `state.toml`; missing or unparseable files count as zero
    pub fn load(config_dir: &Path) -> AllocationState {
        let path = config_dir.join(STATE_FILE_NAME);
        match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable {}: {}", path.display(), e);
                AllocationState::default()
            }),
            Err(_) => AllocationState::default(),
        }
    }

    /// Raise the recorded high-water mark to `id` (never lowers it)
    pub fn record(config_dir: &Path, id: u32) -> Result<(), ColynError> {
        let mut state = AllocationState::load(config_dir);
        if id <= state.last_worktree_id {
            return Ok(());
        }
        state.last_worktree_id = id;
        let content =
            toml::to_string_pretty(&state).map_err(|e| ColynError::Config(e.to_string()))?;
        fs::write(config_dir.join(STATE_FILE_NAME), content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = Config::load(temp.path()).expect("load defaults");
        assert_eq!(config.colyn.env_file, ".env.local");
        assert_eq!(config.colyn.default_port, 3000);
        assert_eq!(config.colyn.update_strategy, UpdateStrategy::Rebase);
        assert!(config.colyn.main_dir.is_none());
    }

    #[test]
    fn test_partial_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(
            temp.path().join("config.toml"),
            "[colyn]\nupdate_strategy = \"merge\"\nmain_dir = \"app\"\n",
        )
        .expect("write config");
        let config = Config::load(temp.path()).expect("load config");
        assert_eq!(config.colyn.update_strategy, UpdateStrategy::Merge);
        assert_eq!(config.colyn.main_dir.as_deref(), Some("app"));
        assert_eq!(config.colyn.env_file, ".env.local");
    }

    #[test]
    fn test_invalid_config_is_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("config.toml"), "[colyn\n").expect("write config");
        let err = Config::load(temp.path()).unwrap_err();
        assert_eq!(err.code(), "E042");
    }

    #[test]
    fn test_allocation_state_only_rises() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(AllocationState::load(temp.path()).last_worktree_id, 0);

        AllocationState::record(temp.path(), 3).expect("record 3");
        AllocationState::record(temp.path(), 2).expect("record 2");
        assert_eq!(AllocationState::load(temp.path()).last_worktree_id, 3);
    }
}
