//! Folding a worktree's branch back into the main branch
//!
//! Two phases. First the main branch is merged into the worktree, so
//! any conflict surfaces where the work lives and can be resolved
//! there. Then the main checkout merges the branch with `--no-ff`,
//! which always records a merge commit. After phase one the second
//! merge cannot conflict; if it does anyway that is reported as its own
//! error class and left for manual inspection.

use std::path::Path;

use serde::Serialize;

use crate::discovery::{WorktreeInfo, discover_project_info};
use crate::error::{ColynError, ConflictOperation};
use crate::git::GitCli;
use crate::layout::ProjectLayout;
use crate::target::WorktreeTarget;

use super::{conflict_or, ensure_clean};

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Push the main branch after a successful merge
    pub push: bool,
}

/// Outcome of pushing main after the merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PushStatus {
    Pushed,
    /// The local merge stands; only the push failed
    Failed { message: String },
}

/// Result of [`merge_worktree`]
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    pub worktree: WorktreeInfo,
    pub branch: String,
    pub main_branch: String,
    /// The branch was already contained in main; nothing was merged
    pub already_merged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushStatus>,
}

/// Merge a worktree's branch into the main branch
pub fn merge_worktree(
    layout: &ProjectLayout,
    target: &WorktreeTarget,
    cwd: &Path,
    options: MergeOptions,
) -> Result<MergeOutcome, ColynError> {
    let info = discover_project_info(layout);
    let worktree = target.resolve(layout, &info, cwd)?;
    let branch = worktree.require_branch()?.to_string();
    let main_branch = info.main_branch.clone();

    let main_git = GitCli::new(&layout.main_dir);
    if main_git.current_branch().as_deref() != Some(main_branch.as_str()) {
        return Err(ColynError::DetachedHead {
            path: layout.main_dir.clone(),
        });
    }

    ensure_clean(layout, &layout.main_dir)?;
    ensure_clean(layout, &worktree.path)?;

    if main_git.is_ancestor(&branch, &main_branch) {
        tracing::info!("{} is already merged into {}", branch, main_branch);
        return Ok(MergeOutcome {
            worktree,
            branch,
            main_branch,
            already_merged: true,
            push: None,
        });
    }

    // Phase 1: reconcile inside the worktree
    let worktree_git = GitCli::new(&worktree.path);
    if !worktree_git.is_ancestor(&main_branch, "HEAD") {
        worktree_git
            .merge(&main_branch)
            .map_err(|e| conflict_or(&worktree_git, ConflictOperation::Merge, e))?;
    }

    // Phase 2: record the merge on main
    let message = format!("Merge branch '{}'", branch);
    main_git.merge_no_ff(&branch, &message).map_err(|e| {
        let files = main_git.conflicted_files();
        if files.is_empty() {
            e
        } else {
            ColynError::UnexpectedMergeConflict {
                branch: branch.clone(),
                path: layout.main_dir.clone(),
                files,
            }
        }
    })?;

    let push = options.push.then(|| match main_git.push(&main_branch) {
        Ok(()) => PushStatus::Pushed,
        Err(e) => {
            tracing::warn!("push of {} failed: {}", main_branch, e);
            PushStatus::Failed {
                message: e.to_string(),
            }
        }
    });

    Ok(MergeOutcome {
        worktree,
        branch,
        main_branch,
        already_merged: false,
        push,
    })
}
