//! Implementation of the `colyn update` command

use colyn_core::{
    BatchItemStatus, ColynError, UpdateStrategy, WorktreeTarget, update_all, update_worktree,
};

use crate::colors::{COLORS, paint};
use crate::output::{JsonResponse, UpdateAllData, print_json};
use crate::prompt::Spinner;

use super::{OutputOptions, current_dir, load_project};

/// Run the update command
///
/// `strategy` overrides the configured one when given.
pub fn run_update(
    target: Option<&str>,
    all: bool,
    strategy: Option<UpdateStrategy>,
    opts: OutputOptions,
) -> Result<i32, ColynError> {
    let cwd = current_dir()?;
    let layout = load_project(&cwd)?;
    let strategy = strategy.unwrap_or(layout.config.colyn.update_strategy);

    if all {
        let spinner = Spinner::start("Updating all worktrees", !opts.narrate());
        let result = update_all(&layout, strategy);
        spinner.finish();
        let report = result?;

        if opts.json {
            let data = UpdateAllData::from(&report);
            let response = if report.is_success() {
                JsonResponse::ok("update", data)
            } else {
                JsonResponse::error("update", data, vec![])
            };
            print_json(&response);
        } else if !opts.quiet {
            if report.pulled_main {
                eprintln!("Pulled {}", report.main_branch);
            }
            for item in &report.items {
                let label = format!("task-{} ({})", item.worktree.id, item.worktree.branch_label());
                match &item.status {
                    BatchItemStatus::Updated { already_up_to_date: true } => {
                        eprintln!("  {} {}", paint("up to date", COLORS.success), label)
                    }
                    BatchItemStatus::Updated { .. } => {
                        eprintln!("  {} {}", paint(format!("{}d", strategy), COLORS.success), label)
                    }
                    BatchItemStatus::Skipped { files } => eprintln!(
                        "  {} {}: {} uncommitted file(s)",
                        paint("skipped", COLORS.warning),
                        label,
                        files.len()
                    ),
                    BatchItemStatus::Failed(err) => {
                        eprintln!("  {} {}: {}", paint("failed", COLORS.fail), label, err);
                        if let Some(hint) = err.hint() {
                            eprintln!("    hint: {}", hint);
                        }
                    }
                }
            }
            eprintln!(
                "{} updated, {} skipped, {} failed",
                report.succeeded(),
                report.skipped(),
                report.failed()
            );
        }

        return Ok(if report.is_success() { 0 } else { 1 });
    }

    let target = WorktreeTarget::parse(target);
    let spinner = Spinner::start("Updating worktree", !opts.narrate());
    let result = update_worktree(&layout, &target, &cwd, strategy);
    spinner.finish();
    let outcome = result?;

    if opts.json {
        print_json(&JsonResponse::ok("update", &outcome));
    } else if !opts.quiet {
        let label = format!(
            "task-{} ({})",
            outcome.worktree.id,
            outcome.worktree.branch_label()
        );
        if outcome.already_up_to_date {
            eprintln!("{} is already up to date with {}", label, outcome.main_branch);
        } else {
            eprintln!(
                "{} {} onto {}",
                paint(format!("{}d", outcome.strategy), COLORS.success),
                label,
                outcome.main_branch
            );
        }
    }

    Ok(0)
}
