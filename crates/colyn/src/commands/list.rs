//! Implementation of the `colyn list` command

use std::path::Path;

use colyn_core::discovery::{ProjectInfo, scan_task_dirs};
use colyn_core::layout::path_is_within;
use colyn_core::{ColynError, ProjectLayout, discover_project_info};

use crate::colors::{COLORS, paint};
use crate::output::{JsonIssue, JsonResponse, ListData, MainEntry, print_json};

use super::{OutputOptions, current_dir, display_path, load_project};

/// Run the list command
pub fn run_list(paths: bool, opts: OutputOptions) -> Result<i32, ColynError> {
    let cwd = current_dir()?;
    let layout = load_project(&cwd)?;
    let info = discover_project_info(&layout);
    let current = current_location(&layout, &info, &cwd);

    let on_disk = scan_task_dirs(&layout.worktrees_dir).len();
    let drift = (on_disk != info.worktrees.len()).then(|| {
        format!(
            "{} task directories on disk but {} registered worktrees; run `colyn repair`",
            on_disk,
            info.worktrees.len()
        )
    });

    if opts.json {
        let data = ListData {
            root: layout.root_dir.clone(),
            main: MainEntry {
                branch: info.main_branch.clone(),
                port: info.main_port,
                path: layout.main_dir.clone(),
            },
            worktrees: info.worktrees,
            current,
        };
        let issues = drift
            .into_iter()
            .map(|message| JsonIssue::warning("W001", message))
            .collect();
        print_json(&JsonResponse::ok_with_issues("list", data, issues));
        return Ok(0);
    }

    if paths {
        println!("{}", layout.main_dir.display());
        for worktree in &info.worktrees {
            println!("{}", worktree.path.display());
        }
    } else if !opts.quiet {
        print_table(&layout, &info, current.as_deref());
    }

    if let Some(message) = drift {
        if !opts.quiet {
            eprintln!("{} {}", paint("warning:", COLORS.warning), message);
        }
    }

    Ok(0)
}

/// "main", the worktree ID, or `None` when `cwd` is in neither
pub fn current_location(layout: &ProjectLayout, info: &ProjectInfo, cwd: &Path) -> Option<String> {
    if path_is_within(cwd, &layout.main_dir) {
        return Some("main".to_string());
    }
    info.find_by_path(cwd).map(|w| w.id.to_string())
}

fn print_table(layout: &ProjectLayout, info: &ProjectInfo, current: Option<&str>) {
    let mut rows: Vec<[String; 4]> = vec![[
        "main".to_string(),
        info.main_branch.clone(),
        info.main_port.to_string(),
        display_path(layout, &layout.main_dir),
    ]];
    rows.extend(info.worktrees.iter().map(|w| {
        [
            w.id.to_string(),
            w.branch_label().to_string(),
            w.port.to_string(),
            display_path(layout, &w.path),
        ]
    }));

    let id_width = rows.iter().map(|r| r[0].len()).max().unwrap_or(2).max(2);
    let branch_width = rows.iter().map(|r| r[1].len()).max().unwrap_or(6).max(6);

    println!(
        "  {:<id_width$}  {:<branch_width$}  {:>5}  PATH",
        "ID", "BRANCH", "PORT"
    );
    for row in rows {
        let marker = if current == Some(row[0].as_str()) {
            paint("*", COLORS.active)
        } else {
            " ".to_string()
        };
        println!(
            "{} {:<id_width$}  {:<branch_width$}  {:>5}  {}",
            marker, row[0], row[1], row[2], row[3]
        );
    }
}
