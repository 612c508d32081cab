//! Implementation of the `colyn merge` command

use colyn_core::{ColynError, MergeOptions, PushStatus, WorktreeTarget, merge_worktree};

use crate::colors::{COLORS, paint};
use crate::output::{JsonIssue, JsonResponse, MergeData, print_json};
use crate::prompt::Spinner;

use super::{OutputOptions, current_dir, load_project};

/// Run the merge command
pub fn run_merge(target: Option<&str>, push: bool, opts: OutputOptions) -> Result<i32, ColynError> {
    let cwd = current_dir()?;
    let layout = load_project(&cwd)?;
    let target = WorktreeTarget::parse(target);

    let spinner = Spinner::start("Merging", !opts.narrate());
    let result = merge_worktree(&layout, &target, &cwd, MergeOptions { push });
    spinner.finish();
    let outcome: MergeData = result?;

    if opts.json {
        let issues = match &outcome.push {
            Some(PushStatus::Failed { message }) => {
                vec![JsonIssue::warning("W002", format!("push failed: {}", message))]
            }
            _ => vec![],
        };
        print_json(&JsonResponse::ok_with_issues("merge", &outcome, issues));
        return Ok(0);
    }
    if opts.quiet {
        return Ok(0);
    }

    if outcome.already_merged {
        eprintln!(
            "{} is already merged into {}; nothing to do",
            outcome.branch, outcome.main_branch
        );
    } else {
        eprintln!(
            "{} {} into {}",
            paint("Merged", COLORS.success),
            outcome.branch,
            outcome.main_branch
        );
    }
    match &outcome.push {
        Some(PushStatus::Pushed) => eprintln!("Pushed {}", outcome.main_branch),
        Some(PushStatus::Failed { message }) => eprintln!(
            "{} push failed, the merge is kept locally: {}",
            paint("warning:", COLORS.warning),
            message
        ),
        None => {}
    }
    eprintln!(
        "Remove the worktree with: colyn remove {}",
        outcome.worktree.id
    );

    Ok(0)
}
