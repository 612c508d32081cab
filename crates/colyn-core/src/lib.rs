//! colyn-core: worktree orchestration for parallel development
//!
//! A colyn project keeps the original checkout and one git worktree per
//! task side by side under a single root. Each worktree gets a stable
//! numeric ID, a directory named after it and its own port, recorded in
//! the worktree's environment file. No database is kept: the project's
//! state is recomputed from git and the filesystem on every call.

/// Core error types for colyn operations
pub mod error;

/// Configuration handling
pub mod config;

/// Environment file reading and in-place rewriting
pub mod env_file;

/// Project layout and root discovery
pub mod layout;

/// git subprocess wrapper
pub mod git;

/// Worktree ID and port allocation
pub mod allocator;

/// Project state recomputed from git and the filesystem
pub mod discovery;

/// Resolving which worktree a command refers to
pub mod target;

/// Add, update, merge and remove
pub mod lifecycle;

/// Reconciliation of git records, directories and env files
pub mod repair;

/// Project initialization
pub mod init;

// Re-exports for convenience
pub use config::{Config, UpdateStrategy};
pub use discovery::{ProjectInfo, WorktreeInfo, discover_project_info};
pub use error::{ColynError, ConflictOperation};
pub use init::{InitKind, InitOutcome, InitPlan, init_project, plan_init};
pub use layout::{ProjectLayout, find_project_root};
pub use lifecycle::{
    AddOutcome, BatchItem, BatchItemStatus, BatchUpdateReport, BranchSource, MergeOptions,
    MergeOutcome, PushStatus, RemoveOptions, RemoveOutcome, UpdateOutcome, add_worktree,
    delete_branch, merge_worktree, remove_worktree, update_all, update_worktree,
};
pub use repair::{EnvFix, OrphanKind, OrphanOutcome, OrphanReport, RepairReport, repair_project};
pub use target::WorktreeTarget;
