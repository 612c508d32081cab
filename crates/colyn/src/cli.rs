//! CLI argument parsing with clap derive

use clap::{Parser, Subcommand};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Colyn - parallel git worktrees with their own ports
#[derive(Parser)]
#[command(name = "colyn")]
#[command(version = VERSION)]
#[command(about = "Parallel git worktrees with per-worktree ports")]
#[command(long_about = "Colyn keeps the original checkout and one git worktree per task side by side under a single project root.\n\nLayout:\n  <root>/.colyn/          Project marker and settings\n  <root>/<root-name>/     Main checkout (WORKTREE=main)\n  <root>/worktrees/task-N Task worktrees (PORT = main PORT + N)\n\nCommands that change directory print a single JSON line on stdout,\n{\"action\":\"cd\",\"targetDir\":\"...\"}, for a shell wrapper to act on.\nEverything else is written to stderr.\n\nSet COLYN_LOG (e.g. COLYN_LOG=debug) to see every git invocation.")]
pub struct Cli {
    /// Increase output verbosity (log git commands)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a colyn project in the current directory
    ///
    /// Moves an existing checkout into <dir>/<dir-name>/ and creates worktrees/ and .colyn/.
    #[command(long_about = "Initialize a colyn project in the current directory.\n\nIn a git checkout, every top-level entry moves into <dir>/<dir-name>/,\nwhich becomes the main checkout. worktrees/ and .colyn/ are created next\nto it, the main env file gets PORT and WORKTREE=main, and the env file\nis added to .gitignore.\n\nIn an already initialized root only the main env file is checked.\nIn an empty directory the skeleton is created with an empty main dir.")]
    Init {
        /// Port for the main checkout (default: existing PORT, else 3000)
        #[arg(long)]
        port: Option<u16>,

        /// Do not ask before moving files
        #[arg(short, long)]
        yes: bool,
    },

    /// Create a worktree for a branch
    ///
    /// Uses a local branch, a branch on origin, or creates one from main.
    #[command(long_about = "Create a worktree for a branch.\n\nThe branch is taken from, in order:\n  - an existing local branch\n  - origin/<branch>, tracked by a new local branch\n  - a new branch created from the main branch\n\nThe worktree gets the next free ID N, the directory worktrees/task-N and\na copy of main's env file with PORT = main PORT + N and WORKTREE = N.")]
    Add {
        /// Branch to check out in the new worktree
        branch: String,
    },

    /// List the main checkout and all worktrees
    List {
        /// Print only absolute paths, one per line
        #[arg(long)]
        paths: bool,
    },

    /// Show which checkout the current directory belongs to
    Info,

    /// Rebase or merge the main branch into a worktree
    ///
    /// Without a target, the worktree containing the current directory is used.
    #[command(long_about = "Bring a worktree up to the tip of the main branch.\n\nThe main checkout is fast-forwarded from its upstream first (if any),\nthen the worktree's branch is rebased onto (or merged with) main.\n\nTARGET is a worktree ID, a branch name, or omitted to use the\nworktree containing the current directory.\n\nWith --all, worktrees with uncommitted changes are skipped and a\nfailure in one worktree does not stop the others.\n\nOn conflict the rebase or merge is left in progress for you to resolve.")]
    Update {
        /// Worktree ID or branch name
        target: Option<String>,

        /// Update every worktree
        #[arg(long, conflicts_with = "target")]
        all: bool,

        /// Rebase onto main (default unless configured otherwise)
        #[arg(long, conflicts_with = "merge")]
        rebase: bool,

        /// Merge main instead of rebasing
        #[arg(long)]
        merge: bool,
    },

    /// Merge a worktree's branch into the main branch
    #[command(long_about = "Merge a worktree's branch into the main branch.\n\nPhase 1 merges main into the worktree, so conflicts are resolved where\nthe work lives. Phase 2 merges the branch into the main checkout with\n--no-ff, always recording a merge commit.\n\nBoth checkouts must be clean and the main checkout must be on the main\nbranch.")]
    Merge {
        /// Worktree ID or branch name
        target: Option<String>,

        /// Push the main branch after merging
        #[arg(long)]
        push: bool,
    },

    /// Remove a worktree
    ///
    /// The branch is kept unless --delete-branch is given or confirmed at the prompt.
    Remove {
        /// Worktree ID or branch name
        target: Option<String>,

        /// Remove even with uncommitted changes; delete unmerged branches
        #[arg(short, long)]
        force: bool,

        /// Delete the worktree's branch afterwards
        #[arg(long, conflicts_with = "keep_branch")]
        delete_branch: bool,

        /// Keep the worktree's branch without asking
        #[arg(long)]
        keep_branch: bool,

        /// Do not prompt; merged branches are deleted, unmerged ones kept
        #[arg(short, long)]
        yes: bool,
    },

    /// Reconcile git's worktree records, directories and env files
    #[command(long_about = "Reconcile git's worktree records, directories and env files.\n\nSteps:\n  1. git worktree repair\n  2. Re-link task-N directories that moved (e.g. after moving the project)\n  3. Rewrite PORT and WORKTREE where they disagree with the directory\n\nDirectories that cannot be tied to a registered branch are reported and\nleft alone. Running repair twice changes nothing the second time.")]
    Repair,
}

impl Commands {
    /// Command name used in JSON responses
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::Add { .. } => "add",
            Commands::List { .. } => "list",
            Commands::Info => "info",
            Commands::Update { .. } => "update",
            Commands::Merge { .. } => "merge",
            Commands::Remove { .. } => "remove",
            Commands::Repair => "repair",
        }
    }
}

/// Get the command args for use in the application
pub fn parse() -> Cli {
    Cli::parse()
}
