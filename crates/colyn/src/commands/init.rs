//! Implementation of the `colyn init` command

use colyn_core::{ColynError, InitKind, InitPlan, init_project, plan_init};

use crate::colors::{COLORS, paint};
use crate::output::{InitData, JsonResponse, print_json};
use crate::prompt;

use super::{OutputOptions, current_dir};

/// Run the init command
pub fn run_init(port: Option<u16>, yes: bool, opts: OutputOptions) -> Result<i32, ColynError> {
    let cwd = current_dir()?;

    if let InitPlan::Restructure { entries } = plan_init(&cwd)? {
        let main_name = cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !yes {
            if !prompt::is_interactive() {
                eprintln!(
                    "error: init would move {} entries into {}/; re-run with --yes to confirm",
                    entries.len(),
                    main_name
                );
                return Ok(1);
            }
            eprintln!("The following entries will move into {}/:", main_name);
            for entry in &entries {
                eprintln!("  {}", entry);
            }
            if !prompt::confirm("Continue?", false)? {
                eprintln!("Aborted; nothing was changed");
                return Ok(1);
            }
        }
    }

    let outcome: InitData = init_project(&cwd, port)?;

    if opts.json {
        print_json(&JsonResponse::ok("init", outcome));
        return Ok(0);
    }
    if opts.quiet {
        return Ok(0);
    }

    let headline = match outcome.kind {
        InitKind::Existing => "Project already initialized",
        InitKind::Restructured => "Initialized colyn project",
        InitKind::Created => "Created colyn project",
    };
    eprintln!(
        "{} in {}",
        paint(headline, COLORS.success),
        outcome.root_dir.display()
    );
    if !outcome.moved.is_empty() {
        eprintln!(
            "  Moved:   {} entries into {}",
            outcome.moved.len(),
            outcome.main_dir.display()
        );
    }
    for key in &outcome.env_keys_written {
        eprintln!("  Updated: {} in main env file", key);
    }
    if outcome.gitignore_updated {
        eprintln!("  Updated: .gitignore (added env file)");
    }
    eprintln!("  Main port: {}", outcome.port);
    if outcome.kind != InitKind::Existing {
        eprintln!();
        eprintln!("Next: cd {} && colyn add <branch>", outcome.main_dir.display());
    }

    Ok(0)
}
