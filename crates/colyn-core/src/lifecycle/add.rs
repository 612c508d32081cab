//! Creating a worktree for a branch

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::Serialize;

use crate::allocator::port_for;
use crate::config::AllocationState;
use crate::discovery::{ProjectInfo, WorktreeInfo, discover_project_info};
use crate::env_file::{PORT_KEY, WORKTREE_KEY, update_env_file};
use crate::error::ColynError;
use crate::git::GitCli;
use crate::layout::{ProjectLayout, same_path};

/// Remote consulted for branches that don't exist locally
const DEFAULT_REMOTE: &str = "origin";

static BRANCH_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-/]+$").expect("valid branch regex"));

static BRANCH_IN_USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"already (?:checked out|used by worktree) at '([^']+)'")
        .expect("valid in-use regex")
});

/// Where the worktree's branch came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchSource {
    /// Branch already existed locally
    Local,
    /// Local tracking branch created from a remote branch
    Remote { remote: String },
    /// New branch created from the main branch
    Created { from: String },
}

/// Result of [`add_worktree`]
#[derive(Debug, Clone, Serialize)]
pub struct AddOutcome {
    pub worktree: WorktreeInfo,
    pub source: BranchSource,
}

/// Check branch name syntax
///
/// Letters, digits, `_`, `-` and `/`; no leading, trailing or doubled `/`.
pub fn validate_branch_name(name: &str) -> Result<(), ColynError> {
    let invalid = |reason: &str| ColynError::InvalidBranchName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("branch name is empty"));
    }
    if !BRANCH_CHARS.is_match(name) {
        return Err(invalid(
            "only letters, digits, '_', '-' and '/' are allowed",
        ));
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid("must not start or end with '/'"));
    }
    if name.contains("//") {
        return Err(invalid("must not contain '//'"));
    }
    Ok(())
}

/// Create a new worktree for `branch`
///
/// The main checkout never changes branch: the target branch is only
/// created or tracked, then checked out in `worktrees/task-<id>`.
pub fn add_worktree(layout: &ProjectLayout, branch: &str) -> Result<AddOutcome, ColynError> {
    validate_branch_name(branch)?;

    let main_git = GitCli::new(&layout.main_dir);
    if !main_git.is_repository() {
        return Err(ColynError::NotAGitRepository {
            path: layout.main_dir.clone(),
        });
    }
    let main_env = layout.main_env_file();
    if !main_env.is_file() {
        return Err(ColynError::MissingEnvFile { path: main_env });
    }

    let info = discover_project_info(layout);
    if branch == info.main_branch {
        return Err(ColynError::CannotUseMainBranch {
            branch: branch.to_string(),
        });
    }
    if let Some(existing) = info.find_by_branch(branch) {
        return Err(ColynError::BranchHasWorktree {
            branch: branch.to_string(),
            id: existing.id,
            path: existing.path.clone(),
            port: existing.port,
        });
    }

    let id = info.next_worktree_id;
    let port = port_for(info.main_port, id).ok_or_else(|| {
        ColynError::Config(format!(
            "port {} + worktree id {} exceeds 65535; lower PORT in {}",
            info.main_port,
            id,
            layout.main_env_file().display()
        ))
    })?;
    let path = layout.task_dir(id);

    let source = resolve_branch(&main_git, branch, &info.main_branch)?;

    if let Err(err) = main_git.worktree_add(&layout.task_dir_from_main(id), branch) {
        return Err(classify_add_failure(branch, &info, err));
    }
    AllocationState::record(&layout.config_dir, id)?;

    seed_env_file(layout, &path, id, port)?;

    tracing::info!("created task-{} for {} on port {}", id, branch, port);

    Ok(AddOutcome {
        worktree: WorktreeInfo {
            id,
            branch: Some(branch.to_string()),
            path,
            port,
            created_at: Utc::now(),
        },
        source,
    })
}

/// Make sure `branch` exists locally without checking it out
fn resolve_branch(
    git: &GitCli<'_>,
    branch: &str,
    main_branch: &str,
) -> Result<BranchSource, ColynError> {
    if git.local_branch_exists(branch) {
        return Ok(BranchSource::Local);
    }

    if git.has_remote(DEFAULT_REMOTE) {
        match git.fetch(DEFAULT_REMOTE) {
            Ok(()) => {
                if git.remote_branch_exists(DEFAULT_REMOTE, branch) {
                    git.create_tracking_branch(branch, DEFAULT_REMOTE)?;
                    return Ok(BranchSource::Remote {
                        remote: DEFAULT_REMOTE.to_string(),
                    });
                }
            }
            Err(e) => tracing::warn!("fetch from {} failed, continuing offline: {}", DEFAULT_REMOTE, e),
        }
    }

    git.create_branch(branch, main_branch)?;
    Ok(BranchSource::Created {
        from: main_branch.to_string(),
    })
}

/// Tell apart the ways `git worktree add` can refuse a branch
fn classify_add_failure(branch: &str, info: &ProjectInfo, err: ColynError) -> ColynError {
    let stderr = match &err {
        ColynError::Git { stderr, .. } => stderr.as_str(),
        _ => return err,
    };

    if let Some(captures) = BRANCH_IN_USE.captures(stderr) {
        let conflicting = PathBuf::from(&captures[1]);
        return match info
            .worktrees
            .iter()
            .find(|w| same_path(&w.path, &conflicting))
        {
            Some(existing) => ColynError::BranchHasWorktree {
                branch: branch.to_string(),
                id: existing.id,
                path: existing.path.clone(),
                port: existing.port,
            },
            None => ColynError::BranchUsedByForeignWorktree {
                branch: branch.to_string(),
                path: conflicting,
            },
        };
    }

    if stderr.contains("already checked out") || stderr.contains("already used by worktree") {
        return ColynError::BranchInUseUnresolved {
            branch: branch.to_string(),
        };
    }

    err
}

/// Clone main's environment file into the new worktree with its own PORT/WORKTREE
fn seed_env_file(layout: &ProjectLayout, path: &Path, id: u32, port: u16) -> Result<(), ColynError> {
    let env_path = layout.env_file(path);
    fs::copy(layout.main_env_file(), &env_path)?;
    update_env_file(
        &env_path,
        &[(PORT_KEY, port.to_string()), (WORKTREE_KEY, id.to_string())],
    )
}
