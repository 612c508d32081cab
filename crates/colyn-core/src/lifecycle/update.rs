//! Bringing worktrees up to the tip of the main branch

use std::path::Path;

use serde::Serialize;

use crate::config::UpdateStrategy;
use crate::discovery::{ProjectInfo, WorktreeInfo, discover_project_info};
use crate::error::{ColynError, ConflictOperation};
use crate::git::GitCli;
use crate::layout::ProjectLayout;
use crate::target::WorktreeTarget;

use super::{conflict_or, ensure_clean, uncommitted_files};

/// Result of updating one worktree
#[derive(Debug, Clone, Serialize)]
pub struct UpdateOutcome {
    pub worktree: WorktreeInfo,
    pub main_branch: String,
    pub strategy: UpdateStrategy,
    /// Main was already contained in the worktree's branch
    pub already_up_to_date: bool,
    /// Main was fast-forwarded from its upstream first
    pub pulled_main: bool,
}

/// Per-worktree result of a batch update
#[derive(Debug)]
pub enum BatchItemStatus {
    Updated { already_up_to_date: bool },
    /// Uncommitted changes; not attempted and not a failure
    Skipped { files: Vec<String> },
    Failed(ColynError),
}

#[derive(Debug)]
pub struct BatchItem {
    pub worktree: WorktreeInfo,
    pub status: BatchItemStatus,
}

/// Result of [`update_all`]
#[derive(Debug)]
pub struct BatchUpdateReport {
    pub main_branch: String,
    pub strategy: UpdateStrategy,
    pub pulled_main: bool,
    pub items: Vec<BatchItem>,
}

impl BatchUpdateReport {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, BatchItemStatus::Updated { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, BatchItemStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, BatchItemStatus::Failed(_)))
    }

    /// Skips don't count against success
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&BatchItemStatus) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.status)).count()
    }
}

/// Update a single worktree onto the main branch
pub fn update_worktree(
    layout: &ProjectLayout,
    target: &WorktreeTarget,
    cwd: &Path,
    strategy: UpdateStrategy,
) -> Result<UpdateOutcome, ColynError> {
    let info = discover_project_info(layout);
    let worktree = target.resolve(layout, &info, cwd)?;

    ensure_clean(layout, &worktree.path)?;
    let pulled_main = pull_main(layout, &info)?;

    let already_up_to_date = sync_worktree(&info, &worktree, strategy)?;

    Ok(UpdateOutcome {
        worktree,
        main_branch: info.main_branch,
        strategy,
        already_up_to_date,
        pulled_main,
    })
}

/// Update every worktree, skipping dirty ones and isolating failures
pub fn update_all(
    layout: &ProjectLayout,
    strategy: UpdateStrategy,
) -> Result<BatchUpdateReport, ColynError> {
    let info = discover_project_info(layout);
    let pulled_main = pull_main(layout, &info)?;

    let items = info
        .worktrees
        .iter()
        .map(|worktree| {
            let status = match uncommitted_files(layout, &worktree.path) {
                Ok(files) if !files.is_empty() => {
                    tracing::info!("skipping task-{}: uncommitted changes", worktree.id);
                    BatchItemStatus::Skipped { files }
                }
                Ok(_) => match sync_worktree(&info, worktree, strategy) {
                    Ok(already_up_to_date) => BatchItemStatus::Updated { already_up_to_date },
                    Err(e) => BatchItemStatus::Failed(e),
                },
                Err(e) => BatchItemStatus::Failed(e),
            };
            BatchItem {
                worktree: worktree.clone(),
                status,
            }
        })
        .collect();

    Ok(BatchUpdateReport {
        main_branch: info.main_branch,
        strategy,
        pulled_main,
        items,
    })
}

/// Fast-forward main from its upstream; `false` when it has none
pub fn pull_main(layout: &ProjectLayout, info: &ProjectInfo) -> Result<bool, ColynError> {
    let main_git = GitCli::new(&layout.main_dir);
    if !main_git.has_upstream(&info.main_branch) {
        tracing::debug!("{} has no upstream, skipping pull", info.main_branch);
        return Ok(false);
    }
    main_git.pull()?;
    Ok(true)
}

/// Rebase or merge the main branch into `worktree`
///
/// Returns `true` when nothing had to be done. On conflict the rebase or
/// merge is left in progress.
pub fn sync_worktree(
    info: &ProjectInfo,
    worktree: &WorktreeInfo,
    strategy: UpdateStrategy,
) -> Result<bool, ColynError> {
    worktree.require_branch()?;
    let git = GitCli::new(&worktree.path);
    let main = info.main_branch.as_str();

    if git.is_ancestor(main, "HEAD") {
        return Ok(true);
    }

    let result = match strategy {
        UpdateStrategy::Rebase => git
            .rebase(main)
            .map_err(|e| conflict_or(&git, ConflictOperation::Rebase, e)),
        UpdateStrategy::Merge => git
            .merge(main)
            .map_err(|e| conflict_or(&git, ConflictOperation::Merge, e)),
    };
    result?;

    tracing::info!("task-{} {}d onto {}", worktree.id, strategy, main);
    Ok(false)
}
