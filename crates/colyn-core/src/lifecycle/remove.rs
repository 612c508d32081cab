//! Removing a worktree

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::discovery::{WorktreeInfo, discover_project_info};
use crate::error::ColynError;
use crate::git::GitCli;
use crate::layout::{ProjectLayout, path_is_within};
use crate::target::WorktreeTarget;

use super::ensure_clean;

#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveOptions {
    /// Remove even with uncommitted changes
    pub force: bool,
}

/// Result of [`remove_worktree`]
#[derive(Debug, Clone, Serialize)]
pub struct RemoveOutcome {
    pub worktree: WorktreeInfo,
    pub main_branch: String,
    /// Whether the branch is contained in main (false also for detached HEADs)
    pub branch_merged: bool,
    /// Set when the caller's directory was inside the removed worktree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relocate_to: Option<PathBuf>,
}

/// Remove a worktree's git record and its directory
///
/// The branch itself is kept; callers decide whether to follow up with
/// [`delete_branch`].
pub fn remove_worktree(
    layout: &ProjectLayout,
    target: &WorktreeTarget,
    cwd: &Path,
    options: RemoveOptions,
) -> Result<RemoveOutcome, ColynError> {
    let info = discover_project_info(layout);
    let worktree = target.resolve(layout, &info, cwd)?;

    if !options.force && worktree.path.is_dir() {
        ensure_clean(layout, &worktree.path)?;
    }

    let main_git = GitCli::new(&layout.main_dir);
    let branch_merged = worktree
        .branch
        .as_deref()
        .is_some_and(|b| main_git.is_ancestor(b, &info.main_branch));
    if !branch_merged {
        tracing::warn!(
            "{} is not merged into {}",
            worktree.branch_label(),
            info.main_branch
        );
    }

    let relocate_to = path_is_within(cwd, &worktree.path).then(|| layout.main_dir.clone());

    // Cleanliness was checked above, so git's own check can be skipped
    if let Err(e) = main_git.worktree_remove(&worktree.path, true) {
        if worktree.path.exists() {
            return Err(e);
        }
        tracing::debug!("directory already gone, pruning record: {}", e);
        main_git.worktree_prune()?;
    }
    if worktree.path.exists() {
        fs::remove_dir_all(&worktree.path)?;
    }

    tracing::info!("removed task-{}", worktree.id);

    Ok(RemoveOutcome {
        worktree,
        main_branch: info.main_branch,
        branch_merged,
        relocate_to,
    })
}

/// Delete a local branch left behind by a removed worktree
///
/// `force` deletes it even when it is not merged.
pub fn delete_branch(layout: &ProjectLayout, branch: &str, force: bool) -> Result<(), ColynError> {
    GitCli::new(&layout.main_dir).delete_branch(branch, force)
}
