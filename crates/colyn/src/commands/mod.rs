//! CLI command implementations
//!
//! Each `run_*` returns the process exit code on success and leaves
//! error reporting to `main`.

pub mod add;
pub mod info;
pub mod init;
pub mod list;
pub mod merge;
pub mod remove;
pub mod repair;
pub mod update;

pub use add::run_add;
pub use info::run_info;
pub use init::run_init;
pub use list::run_list;
pub use merge::run_merge;
pub use remove::{BranchPolicy, run_remove};
pub use repair::run_repair;
pub use update::run_update;

use std::path::{Path, PathBuf};

use colyn_core::{ColynError, ProjectLayout, find_project_root};

/// Global output flags shared by all commands
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputOptions {
    pub json: bool,
    pub quiet: bool,
}

impl OutputOptions {
    /// Whether human narration should be written to stderr
    pub fn narrate(&self) -> bool {
        !self.quiet && !self.json
    }
}

/// Current directory in canonical form, so it compares equal to git's paths
pub fn current_dir() -> Result<PathBuf, ColynError> {
    let cwd = std::env::current_dir()?;
    Ok(cwd.canonicalize().unwrap_or(cwd))
}

/// Locate the project containing `cwd`
pub fn load_project(cwd: &Path) -> Result<ProjectLayout, ColynError> {
    find_project_root(cwd)
}

/// `path` relative to the project root, for display
pub fn display_path(layout: &ProjectLayout, path: &Path) -> String {
    path.strip_prefix(&layout.root_dir)
        .unwrap_or(path)
        .display()
        .to_string()
}
