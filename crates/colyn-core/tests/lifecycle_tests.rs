//! Integration tests for the worktree lifecycle
//!
//! Every test builds a real project in a temp directory:
//! `<tmp>/proj/{proj,worktrees,.colyn}` with a git repository on `main`
//! in the main directory and `PORT=4000` in its environment file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use colyn_core::{
    BatchItemStatus, BranchSource, ColynError, ConflictOperation, MergeOptions, OrphanKind,
    OrphanOutcome, ProjectLayout, PushStatus, RemoveOptions, UpdateStrategy, WorktreeTarget,
    add_worktree, discover_project_info, find_project_root, init_project, merge_worktree,
    remove_worktree, repair_project, update_all, update_worktree,
};
use colyn_core::env_file::read_env_file;

struct TestProject {
    _temp: tempfile::TempDir,
    layout: ProjectLayout,
}

impl TestProject {
    fn main_dir(&self) -> &Path {
        &self.layout.main_dir
    }
}

/// Run git in `dir`, panicking with its stderr on failure
fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn git_ok(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn commit_file(dir: &Path, name: &str, content: &str, message: &str) {
    fs::write(dir.join(name), content).expect("failed to write file");
    git(dir, &["add", name]);
    git(dir, &["commit", "-m", message]);
}

/// Create an initialized project rooted at `<parent>/proj`
fn init_project_at(parent: &Path) -> ProjectLayout {
    let root = parent.join("proj");
    let main_dir = root.join("proj");
    fs::create_dir_all(&main_dir).expect("failed to create main dir");
    fs::create_dir_all(root.join("worktrees")).expect("failed to create worktrees dir");
    fs::create_dir_all(root.join(".colyn")).expect("failed to create .colyn");

    git(&main_dir, &["init", "-b", "main"]);
    git(&main_dir, &["config", "user.name", "Test User"]);
    git(&main_dir, &["config", "user.email", "test@example.com"]);
    git(&main_dir, &["config", "commit.gpgsign", "false"]);

    commit_file(&main_dir, ".gitignore", ".env.local\n", "Ignore env file");
    commit_file(&main_dir, "README.md", "# proj\n", "Initial commit");
    fs::write(main_dir.join(".env.local"), "PORT=4000\nWORKTREE=main\nAPI_URL=http://localhost\n")
        .expect("failed to write env file");

    ProjectLayout::load(&root).expect("failed to load layout")
}

fn setup_project() -> TestProject {
    let temp = tempfile::tempdir().expect("failed to create temp dir");
    let base = temp.path().canonicalize().expect("failed to canonicalize");
    let layout = init_project_at(&base);
    TestProject {
        _temp: temp,
        layout,
    }
}

#[test]
fn test_add_creates_task_worktree() {
    let project = setup_project();

    let outcome = add_worktree(&project.layout, "feature/login").expect("add failed");

    assert_eq!(outcome.worktree.id, 1);
    assert_eq!(outcome.worktree.port, 4001);
    assert_eq!(outcome.worktree.path, project.layout.worktrees_dir.join("task-1"));
    assert_eq!(
        outcome.source,
        BranchSource::Created {
            from: "main".to_string()
        }
    );

    let env = read_env_file(&outcome.worktree.path.join(".env.local"));
    assert_eq!(env.get("PORT").map(String::as_str), Some("4001"));
    assert_eq!(env.get("WORKTREE").map(String::as_str), Some("1"));
    assert_eq!(
        env.get("API_URL").map(String::as_str),
        Some("http://localhost"),
        "other keys are inherited from main"
    );

    assert_eq!(
        git(&outcome.worktree.path, &["rev-parse", "--abbrev-ref", "HEAD"]),
        "feature/login"
    );
    assert_eq!(
        git(project.main_dir(), &["rev-parse", "--abbrev-ref", "HEAD"]),
        "main",
        "main checkout never switches branch"
    );
}

#[test]
fn test_add_existing_local_branch() {
    let project = setup_project();
    git(project.main_dir(), &["branch", "feature/existing"]);

    let outcome = add_worktree(&project.layout, "feature/existing").expect("add failed");
    assert_eq!(outcome.source, BranchSource::Local);
}

#[test]
fn test_add_duplicate_branch_reports_existing_worktree() {
    let project = setup_project();
    add_worktree(&project.layout, "feature/login").expect("first add failed");

    let err = add_worktree(&project.layout, "feature/login").unwrap_err();
    match err {
        ColynError::BranchHasWorktree { id, port, .. } => {
            assert_eq!(id, 1);
            assert_eq!(port, 4001);
        }
        other => panic!("expected BranchHasWorktree, got {:?}", other),
    }
    assert!(!project.layout.worktrees_dir.join("task-2").exists());
}

#[test]
fn test_add_rejects_main_branch_and_missing_env() {
    let project = setup_project();

    let err = add_worktree(&project.layout, "main").unwrap_err();
    assert_eq!(err.code(), "E006");

    fs::remove_file(project.main_dir().join(".env.local")).expect("failed to remove env");
    let err = add_worktree(&project.layout, "feature/x").unwrap_err();
    assert_eq!(err.code(), "E003");
    assert!(!project.layout.worktrees_dir.join("task-1").exists());
}

#[test]
fn test_add_into_occupied_directory_fails_at_git() {
    // Stands in for a concurrent add that claimed the same ID first
    let project = setup_project();
    let squatter = project.layout.worktrees_dir.join("task-1");
    fs::create_dir_all(&squatter).expect("failed to create dir");
    fs::write(squatter.join("notes.txt"), "mine").expect("failed to write file");

    let err = add_worktree(&project.layout, "feature/race").unwrap_err();
    assert_eq!(err.code(), "E040");
    assert_eq!(
        fs::read_to_string(squatter.join("notes.txt")).expect("failed to read"),
        "mine"
    );
    assert!(!squatter.join(".env.local").exists());
}

#[test]
fn test_ids_stay_monotonic_after_removing_highest() {
    let project = setup_project();
    add_worktree(&project.layout, "feature/a").expect("add a failed");
    add_worktree(&project.layout, "feature/b").expect("add b failed");

    remove_worktree(
        &project.layout,
        &WorktreeTarget::ById(2),
        project.main_dir(),
        RemoveOptions::default(),
    )
    .expect("remove failed");

    let outcome = add_worktree(&project.layout, "feature/c").expect("add c failed");
    assert_eq!(outcome.worktree.id, 3);
    assert_eq!(outcome.worktree.port, 4003);
}

#[test]
fn test_discovery_is_idempotent() {
    let project = setup_project();
    add_worktree(&project.layout, "feature/a").expect("add a failed");
    add_worktree(&project.layout, "feature/b").expect("add b failed");

    let first = discover_project_info(&project.layout);
    let second = discover_project_info(&project.layout);
    assert_eq!(first, second);

    assert_eq!(first.main_branch, "main");
    assert_eq!(first.main_port, 4000);
    assert_eq!(first.next_worktree_id, 3);
    let ids: Vec<u32> = first.worktrees.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_eq!(first.worktrees[1].branch.as_deref(), Some("feature/b"));
    assert_eq!(first.worktrees[1].port, 4002);
}

#[test]
fn test_update_all_skips_dirty_worktree() {
    let project = setup_project();
    for branch in ["feature/a", "feature/b", "feature/c"] {
        add_worktree(&project.layout, branch).expect("add failed");
    }
    commit_file(project.main_dir(), "CHANGELOG.md", "v2\n", "Main moves on");

    let dirty = project.layout.worktrees_dir.join("task-2");
    fs::write(dirty.join("scratch.txt"), "wip").expect("failed to write scratch");

    let report = update_all(&project.layout, UpdateStrategy::Rebase).expect("update failed");
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.skipped(), 1);
    assert_eq!(report.failed(), 0);
    assert!(report.is_success());

    match &report.items[1].status {
        BatchItemStatus::Skipped { files } => assert_eq!(files, &vec!["scratch.txt".to_string()]),
        other => panic!("expected task-2 to be skipped, got {:?}", other),
    }

    let updated = project.layout.worktrees_dir.join("task-1");
    assert!(git_ok(&updated, &["merge-base", "--is-ancestor", "main", "HEAD"]));
    assert!(!git_ok(&dirty, &["merge-base", "--is-ancestor", "main", "HEAD"]));
}

#[test]
fn test_update_single_worktree_with_merge_strategy() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/a").expect("add failed").worktree;
    commit_file(&wt.path, "feature.txt", "a\n", "Feature work");
    commit_file(project.main_dir(), "CHANGELOG.md", "v2\n", "Main moves on");

    let outcome = update_worktree(
        &project.layout,
        &WorktreeTarget::ByBranch("feature/a".to_string()),
        project.main_dir(),
        UpdateStrategy::Merge,
    )
    .expect("update failed");
    assert!(!outcome.already_up_to_date);
    assert!(!outcome.pulled_main, "no upstream configured");
    assert!(wt.path.join("CHANGELOG.md").is_file());

    let again = update_worktree(
        &project.layout,
        &WorktreeTarget::ById(1),
        project.main_dir(),
        UpdateStrategy::Merge,
    )
    .expect("second update failed");
    assert!(again.already_up_to_date);
}

#[test]
fn test_update_conflict_leaves_rebase_in_progress() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/a").expect("add failed").worktree;
    commit_file(&wt.path, "README.md", "# from feature\n", "Feature edits readme");
    commit_file(project.main_dir(), "README.md", "# from main\n", "Main edits readme");

    let err = update_worktree(
        &project.layout,
        &WorktreeTarget::ById(1),
        project.main_dir(),
        UpdateStrategy::Rebase,
    )
    .unwrap_err();

    match &err {
        ColynError::Conflict {
            operation, files, ..
        } => {
            assert_eq!(*operation, ConflictOperation::Rebase);
            assert_eq!(files, &vec!["README.md".to_string()]);
        }
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 5);

    let rebase_dir = git(&wt.path, &["rev-parse", "--git-path", "rebase-merge"]);
    let rebase_dir = wt.path.join(rebase_dir);
    assert!(rebase_dir.exists(), "rebase should be left in progress");
}

#[test]
fn test_merge_is_two_phase_with_merge_commit() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/login").expect("add failed").worktree;
    commit_file(&wt.path, "login.txt", "login\n", "Add login");
    commit_file(project.main_dir(), "CHANGELOG.md", "v2\n", "Main moves on");

    let outcome = merge_worktree(
        &project.layout,
        &WorktreeTarget::Auto,
        &wt.path,
        MergeOptions::default(),
    )
    .expect("merge failed");
    assert!(!outcome.already_merged);
    assert_eq!(outcome.branch, "feature/login");
    assert!(outcome.push.is_none());

    let main = project.main_dir();
    let parents = git(main, &["rev-list", "--parents", "-n", "1", "HEAD"]);
    assert_eq!(parents.split_whitespace().count(), 3, "HEAD must be a merge commit");
    let subject = git(main, &["log", "-1", "--format=%s"]);
    assert!(subject.contains("feature/login"), "subject was {}", subject);
    assert!(main.join("login.txt").is_file());

    // Phase 1 brought main into the worktree first
    assert!(wt.path.join("CHANGELOG.md").is_file());
}

#[test]
fn test_merge_already_merged_branch_is_noop() {
    let project = setup_project();
    add_worktree(&project.layout, "feature/empty").expect("add failed");
    let before = git(project.main_dir(), &["rev-parse", "HEAD"]);

    let outcome = merge_worktree(
        &project.layout,
        &WorktreeTarget::ById(1),
        project.main_dir(),
        MergeOptions::default(),
    )
    .expect("merge failed");
    assert!(outcome.already_merged);
    assert_eq!(git(project.main_dir(), &["rev-parse", "HEAD"]), before);
}

#[test]
fn test_remove_from_inside_relocates_to_main() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/a").expect("add failed").worktree;
    let inside = wt.path.join("src");
    fs::create_dir_all(&inside).expect("failed to create src");

    let outcome = remove_worktree(
        &project.layout,
        &WorktreeTarget::Auto,
        &inside,
        RemoveOptions::default(),
    )
    .expect("remove failed");

    assert_eq!(outcome.worktree.id, 1);
    assert_eq!(outcome.relocate_to.as_deref(), Some(project.main_dir()));
    assert!(outcome.branch_merged);
    assert!(!wt.path.exists());
    assert!(git_ok(
        project.main_dir(),
        &["rev-parse", "--verify", "refs/heads/feature/a"]
    ));
    assert!(discover_project_info(&project.layout).worktrees.is_empty());
}

#[test]
fn test_remove_refuses_dirty_worktree_unless_forced() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/a").expect("add failed").worktree;
    fs::write(wt.path.join("README.md"), "edited\n").expect("failed to edit");

    let err = remove_worktree(
        &project.layout,
        &WorktreeTarget::ById(1),
        project.main_dir(),
        RemoveOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "E005");
    assert_eq!(err.files(), ["README.md".to_string()]);
    assert!(wt.path.exists());

    let outcome = remove_worktree(
        &project.layout,
        &WorktreeTarget::ById(1),
        project.main_dir(),
        RemoveOptions { force: true },
    )
    .expect("forced remove failed");
    assert!(outcome.relocate_to.is_none());
    assert!(!wt.path.exists());
}

#[test]
fn test_repair_fixes_env_drift_and_is_idempotent() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/a").expect("add failed").worktree;
    let env_path = wt.path.join(".env.local");
    fs::write(&env_path, "# local\nPORT=9999\nWORKTREE=7\nAPI_URL=x\n").expect("failed to write env");

    let report = repair_project(&project.layout).expect("repair failed");
    assert_eq!(report.failure_count(), 0);
    assert_eq!(report.env_fixes.len(), 1);
    assert_eq!(report.env_fixes[0].id, Some(1));
    assert_eq!(
        fs::read_to_string(&env_path).expect("failed to read env"),
        "# local\nPORT=4001\nWORKTREE=1\nAPI_URL=x\n"
    );

    let again = repair_project(&project.layout).expect("second repair failed");
    assert!(!again.changed_anything());
    assert!(again.env_fixes.is_empty());
}

#[test]
fn test_repair_relinks_after_project_move() {
    let temp = tempfile::tempdir().expect("failed to create temp dir");
    let base = temp.path().canonicalize().expect("failed to canonicalize");
    let before = base.join("a");
    let after = base.join("b");

    let layout = init_project_at(&before);
    add_worktree(&layout, "feature/a").expect("add failed");

    fs::create_dir_all(&after).expect("failed to create destination");
    fs::rename(before.join("proj"), after.join("proj")).expect("failed to move project");
    let layout = ProjectLayout::load(&after.join("proj")).expect("failed to load moved layout");
    assert!(discover_project_info(&layout).worktrees.is_empty());

    let report = repair_project(&layout).expect("repair failed");
    assert_eq!(report.orphans.len(), 1);
    let orphan = &report.orphans[0];
    assert_eq!(orphan.id, 1);
    assert!(matches!(orphan.kind, OrphanKind::PathInvalidated { ref branch, .. } if branch == "feature/a"));
    assert_eq!(orphan.outcome, OrphanOutcome::Relinked);

    let info = discover_project_info(&layout);
    assert_eq!(info.worktrees.len(), 1);
    assert_eq!(info.worktrees[0].branch.as_deref(), Some("feature/a"));
    assert_eq!(
        git(&layout.task_dir(1), &["rev-parse", "--abbrev-ref", "HEAD"]),
        "feature/a"
    );
}

#[test]
fn test_repair_leaves_true_orphan_untouched() {
    let project = setup_project();
    let orphan_dir: PathBuf = project.layout.worktrees_dir.join("task-5");
    fs::create_dir_all(&orphan_dir).expect("failed to create orphan");
    fs::write(orphan_dir.join("keep.txt"), "data").expect("failed to write");

    let report = repair_project(&project.layout).expect("repair failed");
    assert_eq!(report.orphans.len(), 1);
    assert_eq!(report.orphans[0].kind, OrphanKind::TrueOrphan { branch: None });
    assert_eq!(report.orphans[0].outcome, OrphanOutcome::LeftUntouched);
    assert_eq!(report.true_orphans().count(), 1);
    assert_eq!(report.failure_count(), 0);
    assert!(orphan_dir.join("keep.txt").is_file());
}

#[test]
fn test_add_tracks_branch_that_only_exists_on_origin() {
    let project = setup_project();
    let origin = project.layout.root_dir.join("origin.git");
    fs::create_dir_all(&origin).expect("failed to create origin dir");
    git(&origin, &["init", "--bare", "-b", "main"]);

    let main = project.main_dir();
    git(main, &["remote", "add", "origin", origin.to_str().expect("utf-8 path")]);
    git(main, &["branch", "feature/remote"]);
    git(main, &["push", "origin", "main", "feature/remote"]);
    git(main, &["branch", "-D", "feature/remote"]);
    git(main, &["update-ref", "-d", "refs/remotes/origin/feature/remote"]);

    let outcome = add_worktree(&project.layout, "feature/remote").expect("add failed");
    assert_eq!(
        outcome.source,
        BranchSource::Remote {
            remote: "origin".to_string()
        }
    );
    assert_eq!(
        git(main, &["rev-parse", "--abbrev-ref", "feature/remote@{upstream}"]),
        "origin/feature/remote"
    );
    assert_eq!(
        git(&outcome.worktree.path, &["rev-parse", "--abbrev-ref", "HEAD"]),
        "feature/remote"
    );
}

#[test]
fn test_add_refuses_port_past_65535() {
    let project = setup_project();
    fs::write(
        project.main_dir().join(".env.local"),
        "PORT=65535\nWORKTREE=main\n",
    )
    .expect("failed to write env file");

    let err = add_worktree(&project.layout, "feature/high").unwrap_err();
    assert!(matches!(err, ColynError::Config(_)), "got {:?}", err);
    assert!(!project.layout.worktrees_dir.join("task-1").exists());
    assert!(!git_ok(
        project.main_dir(),
        &["rev-parse", "--verify", "refs/heads/feature/high"]
    ));
}

#[test]
fn test_update_all_counts_conflicting_worktree_as_failed() {
    let project = setup_project();
    for branch in ["feature/a", "feature/b", "feature/c"] {
        add_worktree(&project.layout, branch).expect("add failed");
    }
    let conflicting = project.layout.worktrees_dir.join("task-2");
    commit_file(&conflicting, "README.md", "# from feature\n", "Feature edits readme");
    commit_file(project.main_dir(), "README.md", "# from main\n", "Main edits readme");

    let report = update_all(&project.layout, UpdateStrategy::Rebase).expect("update failed");
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.skipped(), 0);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_success());

    match &report.items[1].status {
        BatchItemStatus::Failed(err) => {
            assert_eq!(err.code(), "E030");
            assert_eq!(err.files(), ["README.md".to_string()]);
        }
        other => panic!("expected task-2 to fail, got {:?}", other),
    }
    for id in [1, 3] {
        let dir = project.layout.task_dir(id);
        assert!(git_ok(&dir, &["merge-base", "--is-ancestor", "main", "HEAD"]));
    }
}

#[test]
fn test_merge_phase_one_conflict_leaves_main_untouched() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/a").expect("add failed").worktree;
    commit_file(&wt.path, "README.md", "# from feature\n", "Feature edits readme");
    commit_file(project.main_dir(), "README.md", "# from main\n", "Main edits readme");
    let main_head = git(project.main_dir(), &["rev-parse", "HEAD"]);

    let err = merge_worktree(
        &project.layout,
        &WorktreeTarget::ById(1),
        project.main_dir(),
        MergeOptions::default(),
    )
    .unwrap_err();

    match &err {
        ColynError::Conflict {
            operation, files, ..
        } => {
            assert_eq!(*operation, ConflictOperation::Merge);
            assert_eq!(files, &vec!["README.md".to_string()]);
        }
        other => panic!("expected Conflict, got {:?}", other),
    }
    assert_eq!(err.code(), "E030");
    assert_eq!(git(project.main_dir(), &["rev-parse", "HEAD"]), main_head);
    assert!(
        git_ok(&wt.path, &["rev-parse", "--verify", "MERGE_HEAD"]),
        "merge should be left in progress in the worktree"
    );
}

#[test]
fn test_merge_keeps_local_commit_when_push_fails() {
    let project = setup_project();
    let wt = add_worktree(&project.layout, "feature/a").expect("add failed").worktree;
    commit_file(&wt.path, "feature.txt", "a\n", "Feature work");

    let outcome = merge_worktree(
        &project.layout,
        &WorktreeTarget::ById(1),
        project.main_dir(),
        MergeOptions { push: true },
    )
    .expect("merge failed");

    assert!(matches!(outcome.push, Some(PushStatus::Failed { .. })));
    let parents = git(project.main_dir(), &["rev-list", "--parents", "-n", "1", "HEAD"]);
    assert_eq!(parents.split_whitespace().count(), 3, "merge commit must stay");
    assert!(project.main_dir().join("feature.txt").is_file());
}

#[test]
fn test_repair_after_renaming_project_root() {
    let temp = tempfile::tempdir().expect("failed to create temp dir");
    let base = temp.path().canonicalize().expect("failed to canonicalize");
    let root = base.join("proj");
    fs::create_dir_all(&root).expect("failed to create project dir");
    git(&root, &["init", "-b", "main"]);
    git(&root, &["config", "user.name", "Test User"]);
    git(&root, &["config", "user.email", "test@example.com"]);
    git(&root, &["config", "commit.gpgsign", "false"]);
    commit_file(&root, "README.md", "# proj\n", "Initial commit");

    init_project(&root, Some(4000)).expect("init failed");
    let layout = find_project_root(&root).expect("project not found");
    add_worktree(&layout, "feature/a").expect("add failed");

    let renamed = base.join("proj-renamed");
    fs::rename(&root, &renamed).expect("failed to rename root");

    let layout =
        find_project_root(&renamed.join("worktrees").join("task-1")).expect("renamed project");
    assert_eq!(layout.root_dir, renamed);
    assert_eq!(layout.main_dir, renamed.join("proj"));

    let report = repair_project(&layout).expect("repair failed");
    assert_eq!(report.orphans.len(), 1);
    assert!(matches!(
        report.orphans[0].kind,
        OrphanKind::PathInvalidated { ref branch, .. } if branch == "feature/a"
    ));
    assert_eq!(report.orphans[0].outcome, OrphanOutcome::Relinked);
    assert_eq!(report.failure_count(), 0);

    let info = discover_project_info(&layout);
    assert_eq!(info.worktrees.len(), 1);
    assert_eq!(info.worktrees[0].port, 4001);
    assert_eq!(
        git(&layout.task_dir(1), &["rev-parse", "--abbrev-ref", "HEAD"]),
        "feature/a"
    );
}
