//! Reconciling git's worktree registry, the filesystem and env files
//!
//! Every step checks before it fixes, so running repair twice changes
//! nothing the second time. A directory colyn cannot positively tie to
//! a registered branch is reported and never deleted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::discovery::{discover_project_info, main_port, scan_task_dirs};
use crate::env_file::{MAIN_WORKTREE_VALUE, PORT_KEY, WORKTREE_KEY, read_env_file, update_env_file};
use crate::error::ColynError;
use crate::git::{GitCli, WorktreeRecord, private_git_dir, read_worktree_head_branch};
use crate::layout::{ProjectLayout, same_path};

/// What an unregistered `task-<id>` directory turned out to be
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrphanKind {
    /// git knows the directory's branch under another path: the
    /// directory (or the whole project) moved
    PathInvalidated {
        branch: String,
        registered_path: PathBuf,
    },
    /// Nothing in git's registry matches; left for the user to delete
    TrueOrphan { branch: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum OrphanOutcome {
    Relinked,
    LeftUntouched,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct OrphanReport {
    pub id: u32,
    pub path: PathBuf,
    pub kind: OrphanKind,
    pub outcome: OrphanOutcome,
}

/// One key rewritten in an environment file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvChange {
    pub key: String,
    pub old: Option<String>,
    pub new: String,
}

/// Environment file that needed (or failed to get) corrections
#[derive(Debug, Clone, Serialize)]
pub struct EnvFix {
    pub path: PathBuf,
    /// `None` for the main checkout
    pub id: Option<u32>,
    pub changes: Vec<EnvChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything [`repair_project`] checked and changed
#[derive(Debug, Clone, Serialize, Default)]
pub struct RepairReport {
    /// Error from `git worktree repair`, if it failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_repair_error: Option<String>,
    pub orphans: Vec<OrphanReport>,
    pub env_fixes: Vec<EnvFix>,
}

impl RepairReport {
    /// Items that could not be repaired
    ///
    /// A failing `git worktree repair` is not counted: it also fails on
    /// links that the per-directory pass fixes right after.
    pub fn failure_count(&self) -> usize {
        let orphan_failures = self
            .orphans
            .iter()
            .filter(|o| matches!(o.outcome, OrphanOutcome::Failed(_)))
            .count();
        let env_failures = self.env_fixes.iter().filter(|f| f.error.is_some()).count();
        orphan_failures + env_failures
    }

    pub fn true_orphans(&self) -> impl Iterator<Item = &OrphanReport> {
        self.orphans
            .iter()
            .filter(|o| matches!(o.kind, OrphanKind::TrueOrphan { .. }))
    }

    /// Whether anything was changed on disk or in git
    pub fn changed_anything(&self) -> bool {
        self.orphans
            .iter()
            .any(|o| o.outcome == OrphanOutcome::Relinked)
            || self
                .env_fixes
                .iter()
                .any(|f| f.error.is_none() && !f.changes.is_empty())
    }
}

/// Run every repair step over the project
///
/// Order matters: git's own repair first, then re-linking of moved
/// directories, and only then env files, so a re-linked worktree gets
/// its PORT/WORKTREE rewritten in the same run.
pub fn repair_project(layout: &ProjectLayout) -> Result<RepairReport, ColynError> {
    let main_git = GitCli::new(&layout.main_dir);
    if !main_git.is_repository() {
        return Err(ColynError::NotAGitRepository {
            path: layout.main_dir.clone(),
        });
    }

    let mut report = RepairReport::default();

    if let Err(e) = main_git.worktree_repair(&[]) {
        tracing::warn!("git worktree repair failed: {}", e);
        report.git_repair_error = Some(e.to_string());
    }

    report.orphans = reconcile_orphans(layout, &main_git)?;
    report.env_fixes = fix_env_drift(layout);

    Ok(report)
}

/// Classify and, where possible, re-link `task-*` directories git does not list
fn reconcile_orphans(
    layout: &ProjectLayout,
    main_git: &GitCli<'_>,
) -> Result<Vec<OrphanReport>, ColynError> {
    let records = main_git.worktree_list()?;
    let mut reports = Vec::new();

    for (id, dir) in scan_task_dirs(&layout.worktrees_dir) {
        if records.iter().any(|r| same_path(&r.path, &dir)) {
            continue;
        }

        let branch = recover_branch(layout, &dir);
        let kind = classify_orphan(&dir, branch, &records);
        let outcome = match &kind {
            OrphanKind::PathInvalidated { .. } => relink(main_git, &dir),
            OrphanKind::TrueOrphan { .. } => {
                tracing::warn!("{} is not a registered worktree", dir.display());
                OrphanOutcome::LeftUntouched
            }
        };
        reports.push(OrphanReport {
            id,
            path: dir,
            kind,
            outcome,
        });
    }

    Ok(reports)
}

/// Decide what an unregistered directory is, given its recovered branch
pub fn classify_orphan(
    dir: &Path,
    branch: Option<String>,
    records: &[WorktreeRecord],
) -> OrphanKind {
    let registered = branch.as_deref().and_then(|b| {
        records
            .iter()
            .find(|r| r.branch.as_deref() == Some(b) && !same_path(&r.path, dir))
    });

    match (registered, branch) {
        (Some(record), Some(branch)) => OrphanKind::PathInvalidated {
            branch,
            registered_path: record.path.clone(),
        },
        (_, branch) => OrphanKind::TrueOrphan { branch },
    }
}

/// Branch a directory was checked out on, read from its own git metadata
///
/// Tries the gitdir the `.git` file names, then the same admin entry
/// under the current main repository (the absolute gitdir goes stale
/// when the project root moves), then asks git inside the directory.
fn recover_branch(layout: &ProjectLayout, dir: &Path) -> Option<String> {
    if let Some(branch) = read_worktree_head_branch(dir) {
        return Some(branch);
    }

    // No git metadata at all: nothing to tie the directory to
    let gitdir = private_git_dir(dir)?;

    if let Some(name) = gitdir.file_name() {
        let head = layout
            .main_dir
            .join(".git")
            .join("worktrees")
            .join(name)
            .join("HEAD");
        if let Ok(content) = fs::read_to_string(head) {
            if let Some(branch) = content.trim().strip_prefix("ref: refs/heads/") {
                return Some(branch.to_string());
            }
        }
    }

    GitCli::new(dir).current_branch()
}

fn relink(main_git: &GitCli<'_>, dir: &Path) -> OrphanOutcome {
    // git may report errors for other stale links; the listing decides
    let repaired = main_git.worktree_repair(&[dir.to_path_buf()]);
    match main_git.worktree_list() {
        Ok(records) if records.iter().any(|r| same_path(&r.path, dir)) => {
            tracing::info!("re-linked {}", dir.display());
            OrphanOutcome::Relinked
        }
        Ok(_) => OrphanOutcome::Failed(match repaired {
            Err(e) => e.to_string(),
            Ok(()) => "git still does not list the directory".to_string(),
        }),
        Err(e) => OrphanOutcome::Failed(e.to_string()),
    }
}

/// Rewrite PORT/WORKTREE wherever they disagree with the directory layout
fn fix_env_drift(layout: &ProjectLayout) -> Vec<EnvFix> {
    let info = discover_project_info(layout);
    let port = main_port(layout);

    let mut fixes = Vec::new();
    let main_expected = [
        (PORT_KEY, port.to_string()),
        (WORKTREE_KEY, MAIN_WORKTREE_VALUE.to_string()),
    ];
    fixes.extend(fix_env_file(&layout.main_env_file(), None, &main_expected));

    for worktree in &info.worktrees {
        if !worktree.path.is_dir() {
            continue;
        }
        let path = layout.env_file(&worktree.path);
        let Some(port) = info.expected_port(worktree.id) else {
            fixes.push(EnvFix {
                path,
                id: Some(worktree.id),
                changes: Vec::new(),
                error: Some(format!(
                    "port {} + worktree id {} exceeds 65535",
                    info.main_port, worktree.id
                )),
            });
            continue;
        };
        let expected = [
            (PORT_KEY, port.to_string()),
            (WORKTREE_KEY, worktree.id.to_string()),
        ];
        fixes.extend(fix_env_file(&path, Some(worktree.id), &expected));
    }

    fixes
}

fn fix_env_file(path: &Path, id: Option<u32>, expected: &[(&str, String)]) -> Option<EnvFix> {
    let current = read_env_file(path);
    let stale: Vec<(&str, String)> = expected
        .iter()
        .filter(|(key, value)| current.get(*key) != Some(value))
        .cloned()
        .collect();
    if stale.is_empty() {
        return None;
    }

    let changes = stale
        .iter()
        .map(|(key, value)| EnvChange {
            key: key.to_string(),
            old: current.get(*key).cloned(),
            new: value.clone(),
        })
        .collect();
    let error = update_env_file(path, &stale).err().map(|e| e.to_string());

    Some(EnvFix {
        path: path.to_path_buf(),
        id,
        changes,
        error,
    })
}
