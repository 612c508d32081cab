//! Project layout and root discovery
//!
//! ```text
//! <root>/
//!   .colyn/           marker + settings
//!   <main>/           original checkout (WORKTREE=main)
//!   worktrees/
//!     task-1/         one directory per worktree
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_DIR_NAME, Config, WORKTREES_DIR_NAME};
use crate::error::ColynError;

/// Directory name prefix for task worktrees
pub const TASK_DIR_PREFIX: &str = "task-";

/// Derived paths of a colyn project
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root_dir: PathBuf,
    pub main_dir: PathBuf,
    pub worktrees_dir: PathBuf,
    pub config_dir: PathBuf,
    pub config: Config,
}

impl ProjectLayout {
    /// Build the layout for `root_dir` using its settings
    pub fn new(root_dir: &Path, config: Config) -> Self {
        let main_name = config
            .colyn
            .main_dir
            .clone()
            .or_else(|| {
                root_dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "main".to_string());

        Self {
            root_dir: root_dir.to_path_buf(),
            main_dir: root_dir.join(main_name),
            worktrees_dir: root_dir.join(WORKTREES_DIR_NAME),
            config_dir: root_dir.join(CONFIG_DIR_NAME),
            config,
        }
    }

    /// Load settings from `<root>/.colyn` and build the layout
    ///
    /// Without a recorded `main_dir`, a root whose basename no longer
    /// names a directory (the root was renamed) falls back to its only
    /// git checkout beside `worktrees/`.
    pub fn load(root_dir: &Path) -> Result<Self, ColynError> {
        let mut config = Config::load(&root_dir.join(CONFIG_DIR_NAME))?;
        if config.colyn.main_dir.is_none() {
            let layout = Self::new(root_dir, config.clone());
            if !layout.main_dir.is_dir() {
                if let Some(name) = sole_checkout(root_dir) {
                    tracing::debug!("main dir not recorded, using sole checkout {}", name);
                    config.colyn.main_dir = Some(name);
                }
            }
        }
        Ok(Self::new(root_dir, config))
    }

    /// Whether the main and worktrees directories both exist
    pub fn is_valid(&self) -> bool {
        self.main_dir.is_dir() && self.worktrees_dir.is_dir()
    }

    /// Environment file path inside a checkout directory
    pub fn env_file(&self, dir: &Path) -> PathBuf {
        dir.join(&self.config.colyn.env_file)
    }

    /// Environment file of the main checkout
    pub fn main_env_file(&self) -> PathBuf {
        self.env_file(&self.main_dir)
    }

    /// Absolute path of worktree `id`
    pub fn task_dir(&self, id: u32) -> PathBuf {
        self.worktrees_dir.join(task_dir_name(id))
    }

    /// Path of worktree `id` relative to the main directory
    pub fn task_dir_from_main(&self, id: u32) -> PathBuf {
        Path::new("..")
            .join(WORKTREES_DIR_NAME)
            .join(task_dir_name(id))
    }
}

/// Name of the single git checkout directly under `root_dir`, skipping
/// the marker and worktrees directories
fn sole_checkout(root_dir: &Path) -> Option<String> {
    let mut checkouts = fs::read_dir(root_dir)
        .ok()?
        .flatten()
        .filter(|entry| entry.path().join(".git").exists())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name != CONFIG_DIR_NAME && name != WORKTREES_DIR_NAME);
    let name = checkouts.next()?;
    if checkouts.next().is_some() {
        return None;
    }
    Some(name)
}

/// `task-<id>`
pub fn task_dir_name(id: u32) -> String {
    format!("{}{}", TASK_DIR_PREFIX, id)
}

/// Parse the ID out of a `task-<id>` directory name
pub fn parse_task_id(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(TASK_DIR_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|id| *id > 0)
}

/// Parse the ID out of a path whose last component is `task-<id>`
pub fn task_id_of(path: &Path) -> Option<u32> {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(parse_task_id)
}

/// Find the project root at or above `start`
///
/// A `.colyn` directory alone does not qualify: the main and worktrees
/// directories must exist too, which keeps stray markers (a `.colyn`
/// in a home directory, say) from being taken as projects.
pub fn find_project_root(start: &Path) -> Result<ProjectLayout, ColynError> {
    for dir in start.ancestors() {
        if !dir.join(CONFIG_DIR_NAME).is_dir() {
            continue;
        }
        let layout = ProjectLayout::load(dir)?;
        if layout.is_valid() {
            tracing::debug!("project root: {}", dir.display());
            return Ok(layout);
        }
        tracing::debug!(
            "skipping {}: marker present but main/worktrees missing",
            dir.display()
        );
    }

    Err(ColynError::NotInitialized {
        searched_from: start.to_path_buf(),
    })
}

/// Canonical form of `path` when it exists, the path itself otherwise
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Whether `path` is `base` or lies below it, comparing canonical forms
pub fn path_is_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base) || normalize_path(path).starts_with(normalize_path(base))
}

/// Whether two paths name the same location
pub fn same_path(a: &Path, b: &Path) -> bool {
    a == b || normalize_path(a) == normalize_path(b)
}
