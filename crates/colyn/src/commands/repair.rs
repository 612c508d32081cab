//! Implementation of the `colyn repair` command

use colyn_core::{ColynError, OrphanKind, OrphanOutcome, RepairReport, repair_project};

use crate::colors::{COLORS, paint};
use crate::output::{JsonIssue, JsonResponse, print_json};
use crate::prompt::Spinner;

use super::{OutputOptions, current_dir, display_path, load_project};

/// Run the repair command
pub fn run_repair(opts: OutputOptions) -> Result<i32, ColynError> {
    let cwd = current_dir()?;
    let layout = load_project(&cwd)?;

    let spinner = Spinner::start("Repairing", !opts.narrate());
    let result = repair_project(&layout);
    spinner.finish();
    let report = result?;
    let code = if report.failure_count() == 0 { 0 } else { 1 };

    if opts.json {
        let issues = report_issues(&report);
        let response = if code == 0 {
            JsonResponse::ok_with_issues("repair", &report, issues)
        } else {
            JsonResponse::error("repair", &report, issues)
        };
        print_json(&response);
        return Ok(code);
    }
    if opts.quiet {
        return Ok(code);
    }

    if let Some(err) = &report.git_repair_error {
        eprintln!("{} git worktree repair: {}", paint("warning:", COLORS.warning), err);
    }
    for orphan in &report.orphans {
        let path = display_path(&layout, &orphan.path);
        match (&orphan.kind, &orphan.outcome) {
            (OrphanKind::PathInvalidated { branch, .. }, OrphanOutcome::Relinked) => eprintln!(
                "  {} {} ({})",
                paint("re-linked", COLORS.success),
                path,
                branch
            ),
            (_, OrphanOutcome::Failed(message)) => {
                eprintln!("  {} {}: {}", paint("failed", COLORS.fail), path, message)
            }
            _ => eprintln!(
                "  {} {} is not a registered worktree; inspect it and delete it by hand",
                paint("orphan", COLORS.warning),
                path
            ),
        }
    }
    for fix in &report.env_fixes {
        let label = match fix.id {
            Some(id) => format!("task-{}", id),
            None => "main".to_string(),
        };
        let changes: Vec<String> = fix
            .changes
            .iter()
            .map(|c| format!("{}={}", c.key, c.new))
            .collect();
        match &fix.error {
            None => eprintln!(
                "  {} {}: {}",
                paint("fixed", COLORS.success),
                label,
                changes.join(" ")
            ),
            Some(err) => eprintln!("  {} {}: {}", paint("failed", COLORS.fail), label, err),
        }
    }

    let failures = report.failure_count();
    if failures > 0 {
        eprintln!("{} problem(s) could not be repaired", failures);
    } else if report.changed_anything() || !report.orphans.is_empty() {
        eprintln!("{}", paint("Repair complete", COLORS.success));
    } else {
        eprintln!("{}", paint("Nothing to repair", COLORS.success));
    }

    Ok(code)
}

fn report_issues(report: &RepairReport) -> Vec<JsonIssue> {
    report
        .true_orphans()
        .map(|o| {
            JsonIssue::warning(
                "W004",
                format!("{} is not a registered worktree", o.path.display()),
            )
        })
        .collect()
}
