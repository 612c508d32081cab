//! Implementation of the `colyn remove` command

use colyn_core::{
    ColynError, RemoveOptions, RemoveOutcome, WorktreeTarget, delete_branch, remove_worktree,
};

use crate::colors::{COLORS, paint};
use crate::output::{JsonIssue, JsonResponse, RemoveData, emit_cd, print_json};
use crate::prompt;

use super::{OutputOptions, current_dir, load_project};

/// What to do with the branch once its worktree is gone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchPolicy {
    /// `--delete-branch`
    Delete,
    /// `--keep-branch`
    Keep,
    /// Ask, or with `--yes` delete only if merged
    Ask { assume_yes: bool },
}

/// Run the remove command
pub fn run_remove(
    target: Option<&str>,
    force: bool,
    policy: BranchPolicy,
    opts: OutputOptions,
) -> Result<i32, ColynError> {
    let cwd = current_dir()?;
    let layout = load_project(&cwd)?;
    let target = WorktreeTarget::parse(target);

    let outcome = remove_worktree(&layout, &target, &cwd, RemoveOptions { force })?;

    let mut issues = Vec::new();
    let branch_deleted = match outcome.worktree.branch.as_deref() {
        Some(branch) => match branch_deletion(&outcome, policy, force, opts)? {
            Some(force_delete) => match delete_branch(&layout, branch, force_delete) {
                Ok(()) => true,
                Err(e) => {
                    issues.push(JsonIssue::warning(
                        "W003",
                        format!("branch {} was kept: {}", branch, e),
                    ));
                    false
                }
            },
            None => false,
        },
        None => false,
    };

    if opts.json {
        // relocate_to inside the envelope replaces the cd signal
        let data = RemoveData {
            outcome,
            branch_deleted,
        };
        print_json(&JsonResponse::ok_with_issues("remove", data, issues));
        return Ok(0);
    }

    if !opts.quiet {
        eprintln!(
            "{} task-{} ({})",
            paint("Removed", COLORS.success),
            outcome.worktree.id,
            outcome.worktree.branch_label()
        );
        if branch_deleted {
            eprintln!("  Deleted branch {}", outcome.worktree.branch_label());
        } else if let Some(branch) = &outcome.worktree.branch {
            let note = if outcome.branch_merged {
                "merged"
            } else {
                "not merged"
            };
            eprintln!("  Kept branch {} ({} into {})", branch, note, outcome.main_branch);
        }
        for issue in &issues {
            eprintln!("{} {}", paint("warning:", COLORS.warning), issue.message);
        }
    }
    if let Some(dir) = &outcome.relocate_to {
        emit_cd(dir);
    }

    Ok(0)
}

/// Decide whether to delete the branch; `Some(force)` means delete
fn branch_deletion(
    outcome: &RemoveOutcome,
    policy: BranchPolicy,
    force: bool,
    opts: OutputOptions,
) -> Result<Option<bool>, ColynError> {
    let merged = outcome.branch_merged;
    match policy {
        BranchPolicy::Keep => Ok(None),
        BranchPolicy::Delete if merged => Ok(Some(false)),
        BranchPolicy::Delete if force => Ok(Some(true)),
        BranchPolicy::Delete => {
            if opts.narrate() {
                eprintln!(
                    "{} {} is not merged into {}; keeping it (use --force to delete anyway)",
                    paint("warning:", COLORS.warning),
                    outcome.worktree.branch_label(),
                    outcome.main_branch
                );
            }
            Ok(None)
        }
        BranchPolicy::Ask { assume_yes: true } => Ok(merged.then_some(false)),
        BranchPolicy::Ask { assume_yes: false } => {
            if opts.json || !prompt::is_interactive() {
                return Ok(None);
            }
            let question = if merged {
                format!("Delete branch {}?", outcome.worktree.branch_label())
            } else {
                format!(
                    "Branch {} is not merged into {}. Delete it anyway?",
                    outcome.worktree.branch_label(),
                    outcome.main_branch
                )
            };
            Ok(prompt::confirm(&question, merged)?.then_some(!merged))
        }
    }
}
