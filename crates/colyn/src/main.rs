//! colyn CLI - parallel git worktrees with per-worktree ports

mod cli;
mod colors;
mod commands;
mod output;
mod prompt;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use cli::Commands;
use colyn_core::UpdateStrategy;
use commands::{BranchPolicy, OutputOptions};

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "COLYN_LOG";

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let cli = cli::parse();
    init_tracing(cli.verbose);

    let opts = OutputOptions {
        json: cli.json,
        quiet: cli.quiet,
    };

    let Some(command) = cli.command else {
        // No subcommand - print version info
        if !cli.quiet {
            eprintln!("colyn v{}", env!("CARGO_PKG_VERSION"));
            eprintln!("Use --help for usage information");
        }
        return ExitCode::SUCCESS;
    };
    let name = command.name();

    let result = match command {
        Commands::Init { port, yes } => commands::run_init(port, yes, opts),
        Commands::Add { branch } => commands::run_add(&branch, opts),
        Commands::List { paths } => commands::run_list(paths, opts),
        Commands::Info => commands::run_info(opts),
        Commands::Update {
            target,
            all,
            rebase,
            merge,
        } => {
            let strategy = if merge {
                Some(UpdateStrategy::Merge)
            } else if rebase {
                Some(UpdateStrategy::Rebase)
            } else {
                None
            };
            commands::run_update(target.as_deref(), all, strategy, opts)
        }
        Commands::Merge { target, push } => commands::run_merge(target.as_deref(), push, opts),
        Commands::Remove {
            target,
            force,
            delete_branch,
            keep_branch,
            yes,
        } => {
            let policy = if delete_branch {
                BranchPolicy::Delete
            } else if keep_branch {
                BranchPolicy::Keep
            } else {
                BranchPolicy::Ask { assume_yes: yes }
            };
            commands::run_remove(target.as_deref(), force, policy, opts)
        }
        Commands::Repair => commands::run_repair(opts),
    };

    match result {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => ExitCode::from(output::report_error(name, &e, cli.json)),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        crate::cli::Cli::command().debug_assert();
    }
}
