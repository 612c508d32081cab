//! Error types for colyn operations

use std::path::PathBuf;

use thiserror::Error;

/// Which VCS operation was interrupted by a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictOperation {
    /// `git rebase <main>` inside a worktree
    Rebase,
    /// `git merge <main>` inside a worktree
    Merge,
}

impl std::fmt::Display for ConflictOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictOperation::Rebase => write!(f, "rebase"),
            ConflictOperation::Merge => write!(f, "merge"),
        }
    }
}

/// Core error type for colyn operations
#[derive(Error, Debug)]
pub enum ColynError {
    // === Precondition errors (E001-E011) ===
    /// E001: No valid project root above the starting directory
    #[error("E001: colyn project not initialized (searched from {})", searched_from.display())]
    NotInitialized { searched_from: PathBuf },

    /// E002: Directory is not a git repository
    #[error("E002: not a git repository: {}", path.display())]
    NotAGitRepository { path: PathBuf },

    /// E003: Main directory has no environment file to inherit from
    #[error("E003: environment file missing: {}", path.display())]
    MissingEnvFile { path: PathBuf },

    /// E004: Branch name rejected by syntax check
    #[error("E004: invalid branch name '{name}': {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// E005: Uncommitted changes block the operation
    #[error("E005: uncommitted changes in {}", path.display())]
    DirtyWorkingTree { path: PathBuf, files: Vec<String> },

    /// E006: The main branch cannot be given its own worktree
    #[error("E006: '{branch}' is the main branch and lives in the main directory")]
    CannotUseMainBranch { branch: String },

    /// E007: Worktree has no branch checked out
    #[error("E007: worktree at {} is in detached HEAD state", path.display())]
    DetachedHead { path: PathBuf },

    /// E008: No target given and none could be detected from the current directory
    #[error("E008: could not determine target worktree: {reason}")]
    NoTargetDetected { reason: String },

    /// E009: Target does not match any worktree of this project
    #[error("E009: worktree not found: {target}")]
    WorktreeNotFound { target: String },

    /// E010: task-<N> directory declares a different WORKTREE id
    #[error("E010: {} declares WORKTREE={declared}, expected {expected}", path.display())]
    WorktreeIdMismatch {
        path: PathBuf,
        declared: String,
        expected: u32,
    },

    /// E011: Project root already initialized
    #[error("E011: project already initialized at {}", root.display())]
    AlreadyInitialized { root: PathBuf },

    // === Resource-conflict errors (E020-E022) ===
    /// E020: Branch already has a worktree in this project
    #[error("E020: branch '{branch}' already has worktree task-{id} at {}", path.display())]
    BranchHasWorktree {
        branch: String,
        id: u32,
        path: PathBuf,
        port: u16,
    },

    /// E021: Branch is checked out by a worktree that is not part of this project
    #[error("E021: branch '{branch}' is used by a worktree outside this project: {}", path.display())]
    BranchUsedByForeignWorktree { branch: String, path: PathBuf },

    /// E022: git refused the branch but the conflicting worktree could not be identified
    #[error("E022: branch '{branch}' is already used by another worktree")]
    BranchInUseUnresolved { branch: String },

    // === Conflict errors (E030-E031) ===
    /// E030: Rebase or merge stopped on conflicts; repository left mid-operation
    #[error("E030: {operation} stopped with conflicts in {}", path.display())]
    Conflict {
        operation: ConflictOperation,
        path: PathBuf,
        files: Vec<String>,
    },

    /// E031: Merging a reconciled branch into main conflicted
    #[error("E031: unexpected conflict merging '{branch}' into the main branch")]
    UnexpectedMergeConflict {
        branch: String,
        path: PathBuf,
        files: Vec<String>,
    },

    // === System errors ===
    /// git exited non-zero
    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl ColynError {
    /// Get the error code (e.g., "E001", "E020")
    pub fn code(&self) -> &'static str {
        match self {
            ColynError::NotInitialized { .. } => "E001",
            ColynError::NotAGitRepository { .. } => "E002",
            ColynError::MissingEnvFile { .. } => "E003",
            ColynError::InvalidBranchName { .. } => "E004",
            ColynError::DirtyWorkingTree { .. } => "E005",
            ColynError::CannotUseMainBranch { .. } => "E006",
            ColynError::DetachedHead { .. } => "E007",
            ColynError::NoTargetDetected { .. } => "E008",
            ColynError::WorktreeNotFound { .. } => "E009",
            ColynError::WorktreeIdMismatch { .. } => "E010",
            ColynError::AlreadyInitialized { .. } => "E011",
            ColynError::BranchHasWorktree { .. } => "E020",
            ColynError::BranchUsedByForeignWorktree { .. } => "E021",
            ColynError::BranchInUseUnresolved { .. } => "E022",
            ColynError::Conflict { .. } => "E030",
            ColynError::UnexpectedMergeConflict { .. } => "E031",
            ColynError::Git { .. } => "E040",
            ColynError::Io(_) => "E041",
            ColynError::Config(_) => "E042",
        }
    }

    /// Remediation hint, kept apart from the message
    pub fn hint(&self) -> Option<String> {
        match self {
            ColynError::NotInitialized { .. } => {
                Some("run `colyn init` in the project directory first".to_string())
            }
            ColynError::NotAGitRepository { path } => Some(format!(
                "initialize or clone a repository into {}",
                path.display()
            )),
            ColynError::MissingEnvFile { path } => Some(format!(
                "create {} with PORT and WORKTREE=main, or run `colyn init`",
                path.display()
            )),
            ColynError::InvalidBranchName { .. } => Some(
                "use letters, digits, '-', '_' and single '/' separators, e.g. feature/login"
                    .to_string(),
            ),
            ColynError::DirtyWorkingTree { path, .. } => Some(format!(
                "commit or stash the changes in {} and retry",
                path.display()
            )),
            ColynError::CannotUseMainBranch { .. } => {
                Some("work on the main branch in the main directory".to_string())
            }
            ColynError::DetachedHead { path } => Some(format!(
                "check out a branch in {} (git switch <branch>)",
                path.display()
            )),
            ColynError::NoTargetDetected { .. } => Some(
                "pass a worktree ID or branch name, or run the command inside a worktree"
                    .to_string(),
            ),
            ColynError::WorktreeNotFound { .. } => {
                Some("run `colyn list` to see existing worktrees".to_string())
            }
            ColynError::WorktreeIdMismatch { .. } => {
                Some("run `colyn repair` to rewrite PORT and WORKTREE".to_string())
            }
            ColynError::AlreadyInitialized { .. } => {
                Some("use `colyn repair` to fix an existing project".to_string())
            }
            ColynError::BranchHasWorktree { path, port, .. } => Some(format!(
                "switch to the existing worktree: cd {} (port {})",
                path.display(),
                port
            )),
            ColynError::BranchUsedByForeignWorktree { path, .. } => Some(format!(
                "remove that worktree first (git worktree remove {}) or pick another branch",
                path.display()
            )),
            ColynError::BranchInUseUnresolved { .. } => {
                Some("run `git worktree list` to find which worktree holds the branch".to_string())
            }
            ColynError::Conflict {
                operation, path, ..
            } => Some(format!(
                "resolve the conflicts in {}, then `git add` the files and run `git {} --continue` (or `git {} --abort`)",
                path.display(),
                operation,
                operation
            )),
            ColynError::UnexpectedMergeConflict { path, .. } => Some(format!(
                "inspect {} manually; `git merge --abort` restores the previous state",
                path.display()
            )),
            ColynError::Git { .. } | ColynError::Io(_) | ColynError::Config(_) => None,
        }
    }

    /// Conflicted or dirty files attached to the error, if any
    pub fn files(&self) -> &[String] {
        match self {
            ColynError::DirtyWorkingTree { files, .. }
            | ColynError::Conflict { files, .. }
            | ColynError::UnexpectedMergeConflict { files, .. } => files,
            _ => &[],
        }
    }

    /// Get the exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            ColynError::NotInitialized { .. } | ColynError::AlreadyInitialized { .. } => 2,

            ColynError::NotAGitRepository { .. }
            | ColynError::MissingEnvFile { .. }
            | ColynError::InvalidBranchName { .. }
            | ColynError::DirtyWorkingTree { .. }
            | ColynError::CannotUseMainBranch { .. }
            | ColynError::DetachedHead { .. }
            | ColynError::NoTargetDetected { .. }
            | ColynError::WorktreeNotFound { .. }
            | ColynError::WorktreeIdMismatch { .. } => 3, // Precondition failed

            ColynError::BranchHasWorktree { .. }
            | ColynError::BranchUsedByForeignWorktree { .. }
            | ColynError::BranchInUseUnresolved { .. } => 4, // Resource conflict

            ColynError::Conflict { .. } => 5,
            ColynError::UnexpectedMergeConflict { .. } => 6,

            ColynError::Git { .. } | ColynError::Io(_) | ColynError::Config(_) => 1,
        }
    }
}
