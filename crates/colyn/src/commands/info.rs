//! Implementation of the `colyn info` command

use chrono::Local;

use colyn_core::layout::path_is_within;
use colyn_core::{ColynError, discover_project_info};

use crate::output::{InfoData, JsonResponse, print_json};

use super::{OutputOptions, current_dir, load_project};

/// Run the info command
pub fn run_info(opts: OutputOptions) -> Result<i32, ColynError> {
    let cwd = current_dir()?;
    let layout = load_project(&cwd)?;
    let info = discover_project_info(&layout);

    let worktree = info.find_by_path(&cwd);
    let data = if path_is_within(&cwd, &layout.main_dir) {
        InfoData {
            root: layout.root_dir.clone(),
            location: "main".to_string(),
            id: None,
            branch: Some(info.main_branch.clone()),
            port: Some(info.main_port),
            path: layout.main_dir.clone(),
        }
    } else if let Some(w) = worktree {
        InfoData {
            root: layout.root_dir.clone(),
            location: "worktree".to_string(),
            id: Some(w.id),
            branch: w.branch.clone(),
            port: Some(w.port),
            path: w.path.clone(),
        }
    } else {
        InfoData {
            root: layout.root_dir.clone(),
            location: "root".to_string(),
            id: None,
            branch: None,
            port: None,
            path: cwd.clone(),
        }
    };

    if opts.json {
        print_json(&JsonResponse::ok("info", &data));
        return Ok(0);
    }
    if opts.quiet {
        return Ok(0);
    }

    match data.id {
        Some(id) => println!("task-{}", id),
        None => println!("{}", data.location),
    }
    if let Some(branch) = &data.branch {
        println!("  Branch:  {}", branch);
    }
    if let Some(port) = data.port {
        println!("  Port:    {}", port);
    }
    println!("  Path:    {}", data.path.display());
    if let Some(w) = worktree {
        println!(
            "  Created: {}",
            w.created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        );
    }
    println!("  Root:    {}", data.root.display());

    Ok(0)
}
