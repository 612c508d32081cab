//! Project state discovery
//!
//! There is no database: every command rebuilds [`ProjectInfo`] from
//! git's worktree registry and the per-worktree environment files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::allocator::{next_worktree_id, port_for};
use crate::config::AllocationState;
use crate::env_file::{PORT_KEY, WORKTREE_KEY, read_env_file};
use crate::error::ColynError;
use crate::git::{GitCli, read_worktree_head_branch};
use crate::layout::{ProjectLayout, path_is_within, task_id_of};

/// Branch name assumed when the main checkout's branch can't be read
pub const FALLBACK_MAIN_BRANCH: &str = "main";

/// One task worktree of the project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorktreeInfo {
    pub id: u32,
    /// `None` when the worktree is on a detached HEAD
    pub branch: Option<String>,
    pub path: PathBuf,
    /// Port from the environment file, `0` when absent or unparseable
    pub port: u16,
    pub created_at: DateTime<Utc>,
}

impl WorktreeInfo {
    /// Branch name, or a detached-HEAD error naming the worktree
    pub fn require_branch(&self) -> Result<&str, ColynError> {
        self.branch
            .as_deref()
            .ok_or_else(|| ColynError::DetachedHead {
                path: self.path.clone(),
            })
    }

    /// Branch for display purposes
    pub fn branch_label(&self) -> &str {
        self.branch.as_deref().unwrap_or("(detached)")
    }
}

/// Session-scoped view of the whole project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInfo {
    pub main_branch: String,
    pub main_port: u16,
    pub next_worktree_id: u32,
    /// Sorted ascending by `id`
    pub worktrees: Vec<WorktreeInfo>,
}

impl ProjectInfo {
    pub fn find_by_branch(&self, branch: &str) -> Option<&WorktreeInfo> {
        self.worktrees
            .iter()
            .find(|w| w.branch.as_deref() == Some(branch))
    }

    pub fn find_by_id(&self, id: u32) -> Option<&WorktreeInfo> {
        self.worktrees.iter().find(|w| w.id == id)
    }

    /// Worktree whose directory is `path` or contains it
    pub fn find_by_path(&self, path: &Path) -> Option<&WorktreeInfo> {
        self.worktrees
            .iter()
            .find(|w| path_is_within(path, &w.path))
    }

    /// Port worktree `id` should have, `None` when it falls past 65535
    pub fn expected_port(&self, id: u32) -> Option<u16> {
        port_for(self.main_port, id)
    }
}

/// Discover the current state of the project
///
/// Never fails for a well-formed project. When git cannot list the
/// worktrees, falls back to scanning `worktrees/` and reading each
/// directory's own git metadata for its branch.
pub fn discover_project_info(layout: &ProjectLayout) -> ProjectInfo {
    let main_git = GitCli::new(&layout.main_dir);
    let main_branch = main_git
        .current_branch()
        .unwrap_or_else(|| FALLBACK_MAIN_BRANCH.to_string());
    let main_port = main_port(layout);

    let mut worktrees: Vec<WorktreeInfo> = match main_git.worktree_list() {
        Ok(records) => records
            .into_iter()
            .filter(|record| !record.bare && path_is_within(&record.path, &layout.worktrees_dir))
            .filter_map(|record| {
                let id = task_id_of(&record.path)?;
                Some(worktree_info(layout, id, record.path, record.branch))
            })
            .collect(),
        Err(e) => {
            tracing::warn!("git worktree list failed, scanning directories instead: {}", e);
            scan_task_dirs(&layout.worktrees_dir)
                .into_iter()
                .map(|(id, path)| {
                    let branch = read_worktree_head_branch(&path);
                    worktree_info(layout, id, path, branch)
                })
                .collect()
        }
    };

    worktrees.sort_by_key(|w| w.id);
    worktrees.dedup_by_key(|w| w.id);

    let high_water = AllocationState::load(&layout.config_dir).last_worktree_id;
    let next_worktree_id = next_worktree_id(worktrees.iter().map(|w| w.id), high_water);

    tracing::debug!(
        "discovered {} worktree(s), main={} port={} next_id={}",
        worktrees.len(),
        main_branch,
        main_port,
        next_worktree_id
    );

    ProjectInfo {
        main_branch,
        main_port,
        next_worktree_id,
        worktrees,
    }
}

/// Port declared by the main checkout, or the configured default
pub fn main_port(layout: &ProjectLayout) -> u16 {
    read_env_file(&layout.main_env_file())
        .get(PORT_KEY)
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(layout.config.colyn.default_port)
}

fn worktree_info(
    layout: &ProjectLayout,
    id: u32,
    path: PathBuf,
    branch: Option<String>,
) -> WorktreeInfo {
    let port = read_env_file(&layout.env_file(&path))
        .get(PORT_KEY)
        .and_then(|p| p.trim().parse().ok())
        .unwrap_or(0);
    let created_at = created_at(&path);
    WorktreeInfo {
        id,
        branch,
        path,
        port,
        created_at,
    }
}

fn created_at(path: &Path) -> DateTime<Utc> {
    fs::metadata(path)
        .and_then(|m| m.created().or_else(|_| m.modified()))
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// `task-<id>` directories under `worktrees_dir`, sorted by ID
///
/// Anything else in the directory is not colyn's and is ignored.
pub fn scan_task_dirs(worktrees_dir: &Path) -> Vec<(u32, PathBuf)> {
    let Ok(entries) = fs::read_dir(worktrees_dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<(u32, PathBuf)> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter_map(|path| task_id_of(&path).map(|id| (id, path)))
        .collect();
    dirs.sort_by_key(|(id, _)| *id);
    dirs
}

/// Check that a worktree's environment file agrees with its directory name
///
/// A missing `WORKTREE` key is tolerated; a different value is a
/// configuration error that only `repair` corrects.
pub fn verify_declared_id(layout: &ProjectLayout, worktree: &WorktreeInfo) -> Result<(), ColynError> {
    let env_path = layout.env_file(&worktree.path);
    match read_env_file(&env_path).get(WORKTREE_KEY) {
        Some(declared) if declared.trim() != worktree.id.to_string() => {
            Err(ColynError::WorktreeIdMismatch {
                path: env_path,
                declared: declared.clone(),
                expected: worktree.id,
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn layout_in(root: &Path) -> ProjectLayout {
        let layout = ProjectLayout::new(root, Config::default());
        fs::create_dir_all(&layout.main_dir).expect("mkdir main");
        fs::create_dir_all(&layout.worktrees_dir).expect("mkdir worktrees");
        fs::create_dir_all(&layout.config_dir).expect("mkdir config");
        layout
    }

    #[test]
    fn test_scan_ignores_foreign_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp.path().join("shop"));
        for name in ["task-2", "task-10", "scratch", "task-x"] {
            fs::create_dir_all(layout.worktrees_dir.join(name)).expect("mkdir");
        }
        fs::write(layout.worktrees_dir.join("task-3"), "a file").expect("write file");

        let ids: Vec<u32> = scan_task_dirs(&layout.worktrees_dir)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![2, 10]);
    }

    #[test]
    fn test_degraded_discovery_without_git() {
        // Main dir is not a repository, so git listing fails
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp.path().join("shop"));
        fs::write(layout.main_env_file(), "PORT=4000\nWORKTREE=main\n").expect("write env");

        let task = layout.task_dir(2);
        fs::create_dir_all(task.join(".git")).expect("mkdir .git");
        fs::write(task.join(".git/HEAD"), "ref: refs/heads/feature/a\n").expect("write HEAD");
        fs::write(layout.env_file(&task), "PORT=4002\nWORKTREE=2\n").expect("write env");
        fs::create_dir_all(layout.worktrees_dir.join("notes")).expect("mkdir");

        let info = discover_project_info(&layout);
        assert_eq!(info.main_port, 4000);
        assert_eq!(info.worktrees.len(), 1);
        assert_eq!(info.worktrees[0].id, 2);
        assert_eq!(info.worktrees[0].branch.as_deref(), Some("feature/a"));
        assert_eq!(info.worktrees[0].port, 4002);
        assert_eq!(info.next_worktree_id, 3);
    }

    #[test]
    fn test_missing_port_defaults_to_zero() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp.path().join("shop"));
        fs::create_dir_all(layout.task_dir(1)).expect("mkdir");
        fs::write(layout.env_file(&layout.task_dir(1)), "PORT=abc\n").expect("write env");

        let info = discover_project_info(&layout);
        assert_eq!(info.main_port, 3000);
        assert_eq!(info.worktrees[0].port, 0);
    }

    #[test]
    fn test_verify_declared_id() {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = layout_in(&temp.path().join("shop"));
        let path = layout.task_dir(1);
        fs::create_dir_all(&path).expect("mkdir");
        let worktree = WorktreeInfo {
            id: 1,
            branch: Some("a".to_string()),
            path: path.clone(),
            port: 3001,
            created_at: Utc::now(),
        };

        assert!(verify_declared_id(&layout, &worktree).is_ok());

        fs::write(layout.env_file(&path), "WORKTREE=1\n").expect("write env");
        assert!(verify_declared_id(&layout, &worktree).is_ok());

        fs::write(layout.env_file(&path), "WORKTREE=2\n").expect("write env");
        let err = verify_declared_id(&layout, &worktree).unwrap_err();
        assert_eq!(err.code(), "E010");
    }
}
