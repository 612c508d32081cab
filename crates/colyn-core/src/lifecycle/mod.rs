//! Worktree lifecycle operations: add, update, merge, remove
//!
//! Each operation runs its checks before mutating anything and then
//! applies a short sequence of git steps. A failing step aborts the
//! operation where it stands; nothing is rolled back, so an interrupted
//! rebase or merge stays in place for the user to finish or abort with
//! git, and `repair` is the recovery path for anything else.

mod add;
mod merge;
mod remove;
mod update;

pub use add::{AddOutcome, BranchSource, add_worktree, validate_branch_name};
pub use merge::{MergeOptions, MergeOutcome, PushStatus, merge_worktree};
pub use remove::{RemoveOptions, RemoveOutcome, delete_branch, remove_worktree};
pub use update::{
    BatchItem, BatchItemStatus, BatchUpdateReport, UpdateOutcome, pull_main, sync_worktree,
    update_all, update_worktree,
};

use std::path::Path;

use crate::error::{ColynError, ConflictOperation};
use crate::git::GitCli;
use crate::layout::ProjectLayout;

/// Fail with [`ColynError::DirtyWorkingTree`] unless `dir` is clean
///
/// The colyn-managed environment file does not count as a change.
pub(crate) fn ensure_clean(layout: &ProjectLayout, dir: &Path) -> Result<(), ColynError> {
    let files = uncommitted_files(layout, dir)?;
    if files.is_empty() {
        Ok(())
    } else {
        Err(ColynError::DirtyWorkingTree {
            path: dir.to_path_buf(),
            files,
        })
    }
}

pub(crate) fn uncommitted_files(
    layout: &ProjectLayout,
    dir: &Path,
) -> Result<Vec<String>, ColynError> {
    let env_name = layout.config.colyn.env_file.as_str();
    Ok(GitCli::new(dir)
        .status_porcelain()?
        .into_iter()
        .filter(|file| file != env_name)
        .collect())
}

/// Turn a failed rebase/merge into a conflict error when git left conflicts behind
pub(crate) fn conflict_or(
    git: &GitCli<'_>,
    operation: ConflictOperation,
    err: ColynError,
) -> ColynError {
    let files = git.conflicted_files();
    if files.is_empty() {
        err
    } else {
        ColynError::Conflict {
            operation,
            path: git.dir().to_path_buf(),
            files,
        }
    }
}
