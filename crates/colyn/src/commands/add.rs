//! Implementation of the `colyn add` command

use colyn_core::{BranchSource, ColynError, add_worktree};

use crate::colors::{COLORS, paint};
use crate::output::{JsonResponse, emit_cd, print_json};
use crate::prompt::Spinner;

use super::{OutputOptions, current_dir, display_path, load_project};

/// Run the add command
pub fn run_add(branch: &str, opts: OutputOptions) -> Result<i32, ColynError> {
    let cwd = current_dir()?;
    let layout = load_project(&cwd)?;

    let spinner = Spinner::start(&format!("Creating worktree for {}", branch), !opts.narrate());
    let result = add_worktree(&layout, branch);
    spinner.finish();
    let outcome = result?;

    if opts.json {
        print_json(&JsonResponse::ok("add", &outcome));
        return Ok(0);
    }

    if opts.narrate() {
        let worktree = &outcome.worktree;
        let source = match &outcome.source {
            BranchSource::Local => "existing local branch".to_string(),
            BranchSource::Remote { remote } => format!("tracking {}/{}", remote, branch),
            BranchSource::Created { from } => format!("new branch from {}", from),
        };
        eprintln!(
            "{} task-{} for {} ({})",
            paint("Created", COLORS.success),
            worktree.id,
            branch,
            source
        );
        eprintln!("  Path: {}", display_path(&layout, &worktree.path));
        eprintln!("  Port: {}", worktree.port);
    }
    emit_cd(&outcome.worktree.path);

    Ok(0)
}
