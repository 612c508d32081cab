//! Resolving which worktree a command acts on

use std::path::Path;

use crate::discovery::{ProjectInfo, WorktreeInfo, verify_declared_id};
use crate::env_file::{MAIN_WORKTREE_VALUE, WORKTREE_KEY, read_env_file};
use crate::error::ColynError;
use crate::layout::{ProjectLayout, path_is_within, task_id_of};

/// How the user named the target worktree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorktreeTarget {
    ById(u32),
    ByBranch(String),
    /// Detect from the current directory's environment file
    Auto,
}

impl WorktreeTarget {
    /// All-digit arguments are IDs, anything else a branch, nothing means auto
    pub fn parse(arg: Option<&str>) -> Self {
        match arg.map(str::trim).filter(|a| !a.is_empty()) {
            None => WorktreeTarget::Auto,
            Some(a) if a.chars().all(|c| c.is_ascii_digit()) => match a.parse() {
                Ok(id) => WorktreeTarget::ById(id),
                Err(_) => WorktreeTarget::ByBranch(a.to_string()),
            },
            Some(a) => WorktreeTarget::ByBranch(a.to_string()),
        }
    }

    /// Resolve to a concrete worktree of `info`
    pub fn resolve(
        &self,
        layout: &ProjectLayout,
        info: &ProjectInfo,
        cwd: &Path,
    ) -> Result<WorktreeInfo, ColynError> {
        let worktree = match self {
            WorktreeTarget::ById(id) => {
                info.find_by_id(*id)
                    .ok_or_else(|| ColynError::WorktreeNotFound {
                        target: format!("task-{}", id),
                    })?
            }
            WorktreeTarget::ByBranch(branch) => {
                info.find_by_branch(branch)
                    .ok_or_else(|| ColynError::WorktreeNotFound {
                        target: branch.clone(),
                    })?
            }
            WorktreeTarget::Auto => detect_from_cwd(layout, info, cwd)?,
        };
        verify_declared_id(layout, worktree)?;
        Ok(worktree.clone())
    }
}

/// Find the worktree the current directory belongs to via its `WORKTREE` value
fn detect_from_cwd<'a>(
    layout: &ProjectLayout,
    info: &'a ProjectInfo,
    cwd: &Path,
) -> Result<&'a WorktreeInfo, ColynError> {
    if path_is_within(cwd, &layout.main_dir) {
        return Err(ColynError::NoTargetDetected {
            reason: "the current directory is the main checkout".to_string(),
        });
    }

    let checkout = cwd
        .ancestors()
        .take_while(|dir| path_is_within(dir, &layout.worktrees_dir))
        .find(|dir| layout.env_file(dir).is_file())
        .ok_or_else(|| ColynError::NoTargetDetected {
            reason: format!(
                "no {} found above {}",
                layout.config.colyn.env_file,
                cwd.display()
            ),
        })?;

    let env_path = layout.env_file(checkout);
    let declared = read_env_file(&env_path)
        .get(WORKTREE_KEY)
        .cloned()
        .ok_or_else(|| ColynError::NoTargetDetected {
            reason: format!("{} has no {}", env_path.display(), WORKTREE_KEY),
        })?;

    if declared == MAIN_WORKTREE_VALUE {
        return Err(ColynError::NoTargetDetected {
            reason: format!("{} declares the main checkout", env_path.display()),
        });
    }

    let id: u32 = declared
        .trim()
        .parse()
        .map_err(|_| ColynError::NoTargetDetected {
            reason: format!("{}={} is not a worktree ID", WORKTREE_KEY, declared),
        })?;

    if let Some(dir_id) = task_id_of(checkout) {
        if dir_id != id {
            return Err(ColynError::WorktreeIdMismatch {
                path: env_path,
                declared,
                expected: dir_id,
            });
        }
    }

    info.find_by_id(id).ok_or_else(|| ColynError::WorktreeNotFound {
        target: format!("task-{}", id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::Utc;
    use std::fs;

    #[test]
    fn test_parse_target() {
        assert_eq!(WorktreeTarget::parse(None), WorktreeTarget::Auto);
        assert_eq!(WorktreeTarget::parse(Some("  ")), WorktreeTarget::Auto);
        assert_eq!(WorktreeTarget::parse(Some("3")), WorktreeTarget::ById(3));
        assert_eq!(
            WorktreeTarget::parse(Some("feature/login")),
            WorktreeTarget::ByBranch("feature/login".to_string())
        );
        assert_eq!(
            WorktreeTarget::parse(Some("99999999999")),
            WorktreeTarget::ByBranch("99999999999".to_string())
        );
    }

    fn fixture() -> (tempfile::TempDir, ProjectLayout, ProjectInfo) {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = ProjectLayout::new(&temp.path().join("shop"), Config::default());
        fs::create_dir_all(&layout.main_dir).expect("mkdir main");
        let mut worktrees = Vec::new();
        for (id, branch) in [(1, "feature/a"), (2, "feature/b")] {
            let path = layout.task_dir(id);
            fs::create_dir_all(path.join("src")).expect("mkdir task");
            fs::write(layout.env_file(&path), format!("PORT={}\nWORKTREE={}\n", 3000 + id, id))
                .expect("write env");
            worktrees.push(WorktreeInfo {
                id,
                branch: Some(branch.to_string()),
                path,
                port: 3000 + id as u16,
                created_at: Utc::now(),
            });
        }
        let info = ProjectInfo {
            main_branch: "main".to_string(),
            main_port: 3000,
            next_worktree_id: 3,
            worktrees,
        };
        (temp, layout, info)
    }

    #[test]
    fn test_resolve_by_id_and_branch() {
        let (_temp, layout, info) = fixture();
        let cwd = layout.root_dir.clone();

        let w = WorktreeTarget::ById(2)
            .resolve(&layout, &info, &cwd)
            .expect("by id");
        assert_eq!(w.branch.as_deref(), Some("feature/b"));

        let w = WorktreeTarget::ByBranch("feature/a".to_string())
            .resolve(&layout, &info, &cwd)
            .expect("by branch");
        assert_eq!(w.id, 1);

        let err = WorktreeTarget::ById(9)
            .resolve(&layout, &info, &cwd)
            .unwrap_err();
        assert_eq!(err.code(), "E009");
    }

    #[test]
    fn test_auto_detect_from_nested_directory() {
        let (_temp, layout, info) = fixture();
        let cwd = layout.task_dir(2).join("src");
        let w = WorktreeTarget::Auto
            .resolve(&layout, &info, &cwd)
            .expect("auto");
        assert_eq!(w.id, 2);
    }

    #[test]
    fn test_auto_detect_rejects_main_and_mismatch() {
        let (_temp, layout, info) = fixture();

        let err = WorktreeTarget::Auto
            .resolve(&layout, &info, &layout.main_dir)
            .unwrap_err();
        assert_eq!(err.code(), "E008");

        fs::write(layout.env_file(&layout.task_dir(1)), "PORT=3001\nWORKTREE=2\n")
            .expect("write env");
        let err = WorktreeTarget::Auto
            .resolve(&layout, &info, &layout.task_dir(1))
            .unwrap_err();
        assert_eq!(err.code(), "E010");
    }
}
