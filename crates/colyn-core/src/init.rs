//! Turning a directory into a colyn project
//!
//! Three starting points are handled:
//! - a plain git checkout, whose contents move into `<dir>/<dir-name>/`
//! - an already initialized root, where only main's env keys are checked
//! - an empty directory, which gets the skeleton with an empty main dir

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::{CONFIG_DIR_NAME, Config};
use crate::env_file::{MAIN_WORKTREE_VALUE, PORT_KEY, WORKTREE_KEY, read_env_file, update_env_file};
use crate::error::ColynError;
use crate::layout::{ProjectLayout, find_project_root};

/// Staging directory used while moving a checkout into its main dir
const STAGING_DIR_NAME: &str = ".colyn-init-tmp";

/// What [`init_project`] is about to do in a directory
#[derive(Debug, Clone)]
pub enum InitPlan {
    /// Already a project root
    Existing(ProjectLayout),
    /// A git checkout whose top-level entries will move into the main dir
    Restructure { entries: Vec<String> },
    /// Nothing there yet
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitKind {
    Existing,
    Restructured,
    Created,
}

/// Result of [`init_project`]
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub kind: InitKind,
    pub root_dir: PathBuf,
    pub main_dir: PathBuf,
    /// Top-level entries moved into the main dir
    pub moved: Vec<String>,
    pub port: u16,
    /// Env keys that were written
    pub env_keys_written: Vec<String>,
    /// Whether the env file name was appended to main's `.gitignore`
    pub gitignore_updated: bool,
}

/// Inspect `dir` and decide how it would be initialized
///
/// Fails with [`ColynError::AlreadyInitialized`] when `dir` lies inside
/// another project, and with [`ColynError::NotAGitRepository`] when it
/// has contents but no `.git`.
pub fn plan_init(dir: &Path) -> Result<InitPlan, ColynError> {
    if let Ok(layout) = find_project_root(dir) {
        if layout.root_dir == dir {
            return Ok(InitPlan::Existing(layout));
        }
        return Err(ColynError::AlreadyInitialized {
            root: layout.root_dir,
        });
    }

    let mut entries: Vec<String> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    entries.sort();

    if entries.is_empty() {
        return Ok(InitPlan::Empty);
    }
    if !dir.join(".git").exists() {
        return Err(ColynError::NotAGitRepository {
            path: dir.to_path_buf(),
        });
    }
    if entries.iter().any(|e| e == STAGING_DIR_NAME || e == CONFIG_DIR_NAME) {
        return Err(ColynError::Config(format!(
            "{} contains a leftover {} or {} directory; remove it and retry",
            dir.display(),
            STAGING_DIR_NAME,
            CONFIG_DIR_NAME
        )));
    }

    Ok(InitPlan::Restructure { entries })
}

/// Initialize `dir` according to [`plan_init`]
///
/// `port` sets main's PORT; without it an existing PORT is kept and the
/// configured default is used otherwise.
pub fn init_project(dir: &Path, port: Option<u16>) -> Result<InitOutcome, ColynError> {
    match plan_init(dir)? {
        InitPlan::Existing(mut layout) => {
            if layout.config.colyn.main_dir.is_none() {
                layout.config.colyn.main_dir = Some(dir_name(&layout.main_dir)?);
                layout.config.save(&layout.config_dir)?;
            }
            let (port, env_keys_written) = write_main_env(&layout, port)?;
            Ok(InitOutcome {
                kind: InitKind::Existing,
                root_dir: layout.root_dir,
                main_dir: layout.main_dir,
                moved: Vec::new(),
                port,
                env_keys_written,
                gitignore_updated: false,
            })
        }
        InitPlan::Restructure { entries } => {
            let layout = ProjectLayout::new(dir, recorded_config(dir)?);
            move_into_main(dir, &layout.main_dir, &entries)?;
            create_skeleton(&layout)?;
            let (port, env_keys_written) = write_main_env(&layout, port)?;
            let gitignore_updated = ensure_gitignored(&layout)?;
            tracing::info!(
                "moved {} entries into {}",
                entries.len(),
                layout.main_dir.display()
            );
            Ok(InitOutcome {
                kind: InitKind::Restructured,
                root_dir: layout.root_dir,
                main_dir: layout.main_dir,
                moved: entries,
                port,
                env_keys_written,
                gitignore_updated,
            })
        }
        InitPlan::Empty => {
            let layout = ProjectLayout::new(dir, recorded_config(dir)?);
            fs::create_dir_all(&layout.main_dir)?;
            create_skeleton(&layout)?;
            let (port, env_keys_written) = write_main_env(&layout, port)?;
            Ok(InitOutcome {
                kind: InitKind::Created,
                root_dir: layout.root_dir,
                main_dir: layout.main_dir,
                moved: Vec::new(),
                port,
                env_keys_written,
                gitignore_updated: false,
            })
        }
    }
}

/// Default settings with the main dir name pinned to `dir`'s basename,
/// so renaming the root later does not lose track of it
fn recorded_config(dir: &Path) -> Result<Config, ColynError> {
    let mut config = Config::default();
    config.colyn.main_dir = Some(dir_name(dir)?);
    Ok(config)
}

fn dir_name(dir: &Path) -> Result<String, ColynError> {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| ColynError::Config(format!("{} has no directory name", dir.display())))
}

/// Move `entries` of `dir` into `main_dir`, going through a staging
/// directory so an entry named like the main dir does not collide
fn move_into_main(dir: &Path, main_dir: &Path, entries: &[String]) -> Result<(), ColynError> {
    let staging = dir.join(STAGING_DIR_NAME);
    fs::create_dir(&staging)?;
    for entry in entries {
        fs::rename(dir.join(entry), staging.join(entry))?;
    }
    fs::rename(&staging, main_dir)?;
    Ok(())
}

fn create_skeleton(layout: &ProjectLayout) -> Result<(), ColynError> {
    fs::create_dir_all(&layout.worktrees_dir)?;
    fs::create_dir_all(&layout.config_dir)?;
    if !layout.config_dir.join("config.toml").exists() {
        layout.config.save(&layout.config_dir)?;
    }
    Ok(())
}

/// Make sure main's env file declares PORT and `WORKTREE=main`
fn write_main_env(
    layout: &ProjectLayout,
    port: Option<u16>,
) -> Result<(u16, Vec<String>), ColynError> {
    let path = layout.main_env_file();
    let current = read_env_file(&path);
    let existing_port = current.get(PORT_KEY).and_then(|p| p.trim().parse::<u16>().ok());
    let port = port
        .or(existing_port)
        .unwrap_or(layout.config.colyn.default_port);

    let mut updates: Vec<(&str, String)> = Vec::new();
    if existing_port != Some(port) {
        updates.push((PORT_KEY, port.to_string()));
    }
    if current.get(WORKTREE_KEY).map(String::as_str) != Some(MAIN_WORKTREE_VALUE) {
        updates.push((WORKTREE_KEY, MAIN_WORKTREE_VALUE.to_string()));
    }
    if !updates.is_empty() {
        update_env_file(&path, &updates)?;
    }

    Ok((port, updates.into_iter().map(|(k, _)| k.to_string()).collect()))
}

/// Append the env file name to main's `.gitignore` unless already listed
fn ensure_gitignored(layout: &ProjectLayout) -> Result<bool, ColynError> {
    let entry = layout.config.colyn.env_file.as_str();
    let path = layout.main_dir.join(".gitignore");
    let content = fs::read_to_string(&path).unwrap_or_default();
    if content.lines().any(|line| line.trim() == entry) {
        return Ok(false);
    }

    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    if !content.is_empty() && !content.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{}", entry)?;
    Ok(true)
}
