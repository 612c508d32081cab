//! Output formatting: the JSON envelope, the cd signal and error reports
//!
//! stdout carries only machine-readable output: the `--json` envelope, or
//! a single cd signal line for a shell wrapper. Narration goes to stderr.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use colyn_core::{
    BatchItemStatus, BatchUpdateReport, ColynError, InitOutcome, MergeOutcome, RemoveOutcome,
    UpdateStrategy, WorktreeInfo,
};

use crate::colors::{COLORS, paint};

const SCHEMA_VERSION: &str = "1";

/// JSON response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse<T> {
    /// Schema version for forward compatibility
    pub schema_version: String,
    /// Command that generated this response
    pub command: String,
    /// Status: "ok" or "error"
    pub status: String,
    /// Command-specific payload
    pub data: T,
    /// Errors and warnings
    pub issues: Vec<JsonIssue>,
}

impl<T> JsonResponse<T> {
    /// Create a successful response
    pub fn ok(command: &str, data: T) -> Self {
        Self::ok_with_issues(command, data, vec![])
    }

    /// Create a successful response with warnings attached
    pub fn ok_with_issues(command: &str, data: T, issues: Vec<JsonIssue>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            command: command.to_string(),
            status: "ok".to_string(),
            data,
            issues,
        }
    }

    /// Create an error response
    pub fn error(command: &str, data: T, issues: Vec<JsonIssue>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            command: command.to_string(),
            status: "error".to_string(),
            data,
            issues,
        }
    }
}

/// Issue object in the JSON envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonIssue {
    /// Error code (e.g., "E005")
    pub code: String,
    /// "error" or "warning"
    pub severity: String,
    pub message: String,
    /// Remediation, distinct from the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Files involved (dirty or conflicted paths)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl JsonIssue {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            severity: "warning".to_string(),
            message: message.into(),
            hint: None,
            files: vec![],
        }
    }
}

impl From<&ColynError> for JsonIssue {
    fn from(err: &ColynError) -> Self {
        Self {
            code: err.code().to_string(),
            severity: "error".to_string(),
            message: err.to_string(),
            hint: err.hint(),
            files: err.files().to_vec(),
        }
    }
}

/// Print a JSON response to stdout
pub fn print_json<T: Serialize>(response: &JsonResponse<T>) {
    match serde_json::to_string_pretty(response) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("error: failed to serialize response: {}", e),
    }
}

/// Instruction for the shell wrapper to change directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CdSignal {
    pub action: String,
    pub target_dir: String,
}

impl CdSignal {
    pub fn new(dir: &Path) -> Self {
        Self {
            action: "cd".to_string(),
            target_dir: dir.display().to_string(),
        }
    }
}

/// Print the single-line cd signal to stdout
pub fn emit_cd(dir: &Path) {
    match serde_json::to_string(&CdSignal::new(dir)) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("error: failed to serialize cd signal: {}", e),
    }
}

/// Report a failed command and return its exit code
///
/// With `--json` the error envelope goes to stdout; otherwise the
/// message, the files involved and the hint go to stderr.
pub fn report_error(command: &str, err: &ColynError, json_output: bool) -> u8 {
    if json_output {
        let response: JsonResponse<Option<()>> =
            JsonResponse::error(command, None, vec![JsonIssue::from(err)]);
        print_json(&response);
    } else {
        eprintln!("{} {}", paint("error:", COLORS.fail), err);
        for file in err.files() {
            eprintln!("  {}", file);
        }
        if let Some(hint) = err.hint() {
            eprintln!("{} {}", paint("hint:", COLORS.warning), hint);
        }
    }
    u8::try_from(err.exit_code()).unwrap_or(1)
}

/// Data payload for `colyn init`
pub type InitData = InitOutcome;

/// The main checkout in `list`/`info` output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainEntry {
    pub branch: String,
    pub port: u16,
    pub path: PathBuf,
}

/// Data payload for `colyn list`
#[derive(Debug, Clone, Serialize)]
pub struct ListData {
    pub root: PathBuf,
    pub main: MainEntry,
    pub worktrees: Vec<WorktreeInfo>,
    /// "main", a worktree ID, or absent when outside both
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
}

/// Data payload for `colyn info`
#[derive(Debug, Clone, Serialize)]
pub struct InfoData {
    pub root: PathBuf,
    /// "main", "worktree" or "root"
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub path: PathBuf,
}

/// Per-worktree line of a batch update
#[derive(Debug, Clone, Serialize)]
pub struct UpdateItemData {
    pub id: u32,
    pub branch: Option<String>,
    /// "updated", "up_to_date", "skipped" or "failed"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonIssue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

/// Data payload for `colyn update --all`
#[derive(Debug, Clone, Serialize)]
pub struct UpdateAllData {
    pub main_branch: String,
    pub strategy: UpdateStrategy,
    pub pulled_main: bool,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub items: Vec<UpdateItemData>,
}

impl From<&BatchUpdateReport> for UpdateAllData {
    fn from(report: &BatchUpdateReport) -> Self {
        let items = report
            .items
            .iter()
            .map(|item| {
                let (status, error, files) = match &item.status {
                    BatchItemStatus::Updated { already_up_to_date } => {
                        let status = if *already_up_to_date {
                            "up_to_date"
                        } else {
                            "updated"
                        };
                        (status, None, vec![])
                    }
                    BatchItemStatus::Skipped { files } => ("skipped", None, files.clone()),
                    BatchItemStatus::Failed(err) => {
                        ("failed", Some(JsonIssue::from(err)), err.files().to_vec())
                    }
                };
                UpdateItemData {
                    id: item.worktree.id,
                    branch: item.worktree.branch.clone(),
                    status: status.to_string(),
                    error,
                    files,
                }
            })
            .collect();

        Self {
            main_branch: report.main_branch.clone(),
            strategy: report.strategy,
            pulled_main: report.pulled_main,
            succeeded: report.succeeded(),
            skipped: report.skipped(),
            failed: report.failed(),
            items,
        }
    }
}

/// Data payload for `colyn merge`
pub type MergeData = MergeOutcome;

/// Data payload for `colyn remove`
#[derive(Debug, Clone, Serialize)]
pub struct RemoveData {
    #[serde(flatten)]
    pub outcome: RemoveOutcome,
    pub branch_deleted: bool,
}
