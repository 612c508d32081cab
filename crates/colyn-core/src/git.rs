//! Git CLI wrapper
//!
//! Every repository mutation colyn performs goes through `git` itself.
//! Nothing here retries: a failing command surfaces immediately as
//! [`ColynError::Git`] with git's stderr attached.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::ColynError;

/// One entry of `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeRecord {
    pub path: PathBuf,
    /// Short branch name; `None` when detached or bare
    pub branch: Option<String>,
    pub head: Option<String>,
    pub bare: bool,
    pub detached: bool,
    /// git considers the administrative entry stale (directory gone)
    pub prunable: bool,
}

/// Git CLI wrapper bound to one working directory
#[derive(Debug, Clone, Copy)]
pub struct GitCli<'a> {
    dir: &'a Path,
}

impl<'a> GitCli<'a> {
    pub fn new(dir: &'a Path) -> Self {
        Self { dir }
    }

    /// Directory commands run in
    pub fn dir(&self) -> &Path {
        self.dir
    }

    fn output(&self, args: &[&str]) -> Result<Output, ColynError> {
        tracing::debug!("git -C {} {}", self.dir.display(), args.join(" "));
        let mut command = Command::new("git");
        // The caller's own cwd may be a worktree that was just removed
        if self.dir.is_absolute() && self.dir.is_dir() {
            command.current_dir(self.dir);
        }
        let output = command
            .arg("-C")
            .arg(self.dir)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()?;
        Ok(output)
    }

    /// Run and require success, returning trimmed stdout
    fn run(&self, args: &[&str]) -> Result<String, ColynError> {
        let output = self.output(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(ColynError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    /// Run and report only whether git exited zero
    fn succeeds(&self, args: &[&str]) -> bool {
        self.output(args)
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Whether the directory is inside a git work tree
    pub fn is_repository(&self) -> bool {
        self.dir.is_dir() && self.succeeds(&["rev-parse", "--is-inside-work-tree"])
    }

    /// Currently checked-out branch; `None` when detached or on error
    pub fn current_branch(&self) -> Option<String> {
        self.run(&["branch", "--show-current"])
            .ok()
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
    }

    /// Whether `refs/heads/<branch>` exists
    pub fn local_branch_exists(&self, branch: &str) -> bool {
        self.succeeds(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/heads/{}", branch),
        ])
    }

    /// Whether `refs/remotes/<remote>/<branch>` exists
    pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> bool {
        self.succeeds(&[
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/remotes/{}/{}", remote, branch),
        ])
    }

    /// Whether a remote with this name is configured
    pub fn has_remote(&self, remote: &str) -> bool {
        self.succeeds(&["remote", "get-url", remote])
    }

    pub fn fetch(&self, remote: &str) -> Result<(), ColynError> {
        self.run(&["fetch", remote]).map(drop)
    }

    /// Create `branch` at `start_point` without checking it out
    pub fn create_branch(&self, branch: &str, start_point: &str) -> Result<(), ColynError> {
        self.run(&["branch", branch, start_point]).map(drop)
    }

    /// Create local `branch` tracking `<remote>/<branch>`
    pub fn create_tracking_branch(&self, branch: &str, remote: &str) -> Result<(), ColynError> {
        self.run(&[
            "branch",
            "--track",
            branch,
            &format!("{}/{}", remote, branch),
        ])
        .map(drop)
    }

    pub fn delete_branch(&self, branch: &str, force: bool) -> Result<(), ColynError> {
        let flag = if force { "-D" } else { "-d" };
        self.run(&["branch", flag, branch]).map(drop)
    }

    /// `git worktree add <path> <branch>`; `path` may be relative to this directory
    pub fn worktree_add(&self, path: &Path, branch: &str) -> Result<(), ColynError> {
        let path = path_arg(path)?;
        self.run(&["worktree", "add", path, branch]).map(drop)
    }

    /// All worktrees registered against the repository, main included
    pub fn worktree_list(&self) -> Result<Vec<WorktreeRecord>, ColynError> {
        let raw = self.run(&["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_porcelain(&raw))
    }

    pub fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), ColynError> {
        let path = path_arg(path)?;
        let mut args = vec!["worktree", "remove"];
        if force {
            args.push("--force");
        }
        args.push(path);
        self.run(&args).map(drop)
    }

    /// Drop administrative records of worktrees whose directories are gone
    pub fn worktree_prune(&self) -> Result<(), ColynError> {
        self.run(&["worktree", "prune"]).map(drop)
    }

    /// `git worktree repair [<path>...]`
    pub fn worktree_repair(&self, paths: &[PathBuf]) -> Result<(), ColynError> {
        let mut args = vec!["worktree".to_string(), "repair".to_string()];
        for path in paths {
            args.push(path_arg(path)?.to_string());
        }
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args).map(drop)
    }

    /// Paths reported by `git status --porcelain` (untracked included)
    pub fn status_porcelain(&self) -> Result<Vec<String>, ColynError> {
        let raw = self.run(&["status", "--porcelain", "--untracked-files=all"])?;
        Ok(raw
            .lines()
            .filter(|line| line.len() > 3)
            .map(|line| {
                let path = &line[3..];
                // Renames read "old -> new"
                path.rsplit(" -> ").next().unwrap_or(path).to_string()
            })
            .collect())
    }

    /// Whether `branch` has an upstream configured
    pub fn has_upstream(&self, branch: &str) -> bool {
        self.succeeds(&[
            "rev-parse",
            "--abbrev-ref",
            "--symbolic-full-name",
            &format!("{}@{{upstream}}", branch),
        ])
    }

    /// Fast-forward the current branch from its upstream
    pub fn pull(&self) -> Result<(), ColynError> {
        self.run(&["pull", "--ff-only"]).map(drop)
    }

    pub fn rebase(&self, onto: &str) -> Result<(), ColynError> {
        self.run(&["rebase", onto]).map(drop)
    }

    pub fn merge(&self, branch: &str) -> Result<(), ColynError> {
        self.run(&["merge", "--no-edit", branch]).map(drop)
    }

    /// Merge with a merge commit even when a fast-forward is possible
    pub fn merge_no_ff(&self, branch: &str, message: &str) -> Result<(), ColynError> {
        self.run(&["merge", "--no-ff", "--no-edit", "-m", message, branch])
            .map(drop)
    }

    /// Files with unresolved conflicts
    pub fn conflicted_files(&self) -> Vec<String> {
        self.run(&["diff", "--name-only", "--diff-filter=U"])
            .map(|out| {
                out.lines()
                    .filter(|l| !l.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `ancestor` is reachable from `descendant`
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        self.succeeds(&["merge-base", "--is-ancestor", ancestor, descendant])
    }

    /// Push `branch` to its upstream, or to `origin` when none is set
    pub fn push(&self, branch: &str) -> Result<(), ColynError> {
        if self.has_upstream(branch) {
            self.run(&["push"]).map(drop)
        } else {
            self.run(&["push", "origin", branch]).map(drop)
        }
    }

    /// Subject line of the HEAD commit
    pub fn log_tip_subject(&self) -> Result<String, ColynError> {
        self.run(&["log", "-1", "--format=%s"])
    }
}

fn path_arg(path: &Path) -> Result<&str, ColynError> {
    path.to_str().ok_or_else(|| ColynError::Git {
        command: "worktree".to_string(),
        stderr: format!("path is not valid UTF-8: {}", path.display()),
    })
}

/// Parse `git worktree list --porcelain`
pub fn parse_worktree_porcelain(raw: &str) -> Vec<WorktreeRecord> {
    let mut records = Vec::new();
    let mut current: Option<WorktreeRecord> = None;

    for line in raw.lines() {
        if line.is_empty() {
            records.extend(current.take());
            continue;
        }

        if let Some(path) = line.strip_prefix("worktree ") {
            records.extend(current.take());
            current = Some(WorktreeRecord {
                path: PathBuf::from(path.trim()),
                branch: None,
                head: None,
                bare: false,
                detached: false,
                prunable: false,
            });
            continue;
        }

        let Some(record) = current.as_mut() else {
            continue;
        };
        if let Some(head) = line.strip_prefix("HEAD ") {
            record.head = Some(head.trim().to_string());
        } else if let Some(branch) = line.strip_prefix("branch ") {
            let branch = branch.trim();
            record.branch = Some(
                branch
                    .strip_prefix("refs/heads/")
                    .unwrap_or(branch)
                    .to_string(),
            );
        } else if line == "bare" {
            record.bare = true;
        } else if line == "detached" {
            record.detached = true;
        } else if line.starts_with("prunable") {
            record.prunable = true;
        }
    }

    records.extend(current);
    records
}

/// Branch recorded in a checkout's own git metadata, without running git
///
/// Follows a linked worktree's `.git` file to its private gitdir and
/// reads `HEAD` there. Returns `None` when the metadata is missing or
/// HEAD is detached.
pub fn read_worktree_head_branch(dir: &Path) -> Option<String> {
    let head = fs::read_to_string(private_git_dir(dir)?.join("HEAD")).ok()?;
    head.trim()
        .strip_prefix("ref: refs/heads/")
        .map(str::to_string)
}

/// The gitdir a checkout points at (`.git` directory or `gitdir:` target)
pub fn private_git_dir(dir: &Path) -> Option<PathBuf> {
    let dot_git = dir.join(".git");
    if dot_git.is_dir() {
        return Some(dot_git);
    }
    let content = fs::read_to_string(&dot_git).ok()?;
    let target = content.trim().strip_prefix("gitdir:")?.trim();
    let target = Path::new(target);
    Some(if target.is_absolute() {
        target.to_path_buf()
    } else {
        dir.join(target)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PORCELAIN: &str = "worktree /work/shop/shop
HEAD 1111111111111111111111111111111111111111
branch refs/heads/main

worktree /work/shop/worktrees/task-1
HEAD 2222222222222222222222222222222222222222
branch refs/heads/feature/login

worktree /work/shop/worktrees/task-2
HEAD 3333333333333333333333333333333333333333
detached

worktree /old/place/task-3
HEAD 4444444444444444444444444444444444444444
branch refs/heads/fix/typo
prunable gitdir file points to non-existent location
";

    #[test]
    fn test_parse_worktree_porcelain() {
        let records = parse_worktree_porcelain(PORCELAIN);
        assert_eq!(records.len(), 4);

        assert_eq!(records[0].path, PathBuf::from("/work/shop/shop"));
        assert_eq!(records[0].branch.as_deref(), Some("main"));

        assert_eq!(records[1].branch.as_deref(), Some("feature/login"));
        assert!(!records[1].detached);

        assert!(records[2].detached);
        assert!(records[2].branch.is_none());

        assert!(records[3].prunable);
        assert_eq!(records[3].branch.as_deref(), Some("fix/typo"));
    }

    #[test]
    fn test_parse_empty_porcelain() {
        assert!(parse_worktree_porcelain("").is_empty());
    }

    #[test]
    fn test_read_head_branch_through_gitdir_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let admin = temp.path().join("repo/.git/worktrees/task-1");
        fs::create_dir_all(&admin).expect("mkdir admin");
        fs::write(admin.join("HEAD"), "ref: refs/heads/feature/login\n").expect("write HEAD");

        let checkout = temp.path().join("worktrees/task-1");
        fs::create_dir_all(&checkout).expect("mkdir checkout");
        fs::write(
            checkout.join(".git"),
            format!("gitdir: {}\n", admin.display()),
        )
        .expect("write .git");

        assert_eq!(
            read_worktree_head_branch(&checkout).as_deref(),
            Some("feature/login")
        );
    }

    #[test]
    fn test_read_head_branch_detached_or_missing() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(read_worktree_head_branch(temp.path()).is_none());

        fs::create_dir_all(temp.path().join(".git")).expect("mkdir .git");
        fs::write(
            temp.path().join(".git/HEAD"),
            "4444444444444444444444444444444444444444\n",
        )
        .expect("write HEAD");
        assert!(read_worktree_head_branch(temp.path()).is_none());
    }
}
