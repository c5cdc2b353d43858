mod adapters;
mod cli;
mod config;
mod core;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, app_filter};
use crate::core::services::orchestrator::{BackupOptions, RestoreOptions};

fn main() {
    let args = Cli::parse();
    init_tracing(args.verbose);
    cli::output::set_quiet(args.quiet);
    cli::context::install_interrupt_handler();

    let config = args.config.as_deref();
    let result = match &args.command {
        Commands::Backup { force, push, apps } => cli::commands::backup::execute(
            config,
            BackupOptions {
                force: *force,
                push: *push,
                apps: app_filter(apps),
            },
        ),
        Commands::Restore { force, pull, apps } => cli::commands::restore::execute(
            config,
            RestoreOptions {
                force: *force,
                pull: *pull,
                apps: app_filter(apps),
            },
        ),
        Commands::Status => cli::commands::status::execute(config),
        Commands::Apps => cli::commands::apps::execute(config),
    };

    if let Err(e) = result {
        cli::output::error(&format!("Error: {e}"));
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the verbosity flag.
fn init_tracing(verbose: bool) {
    let default = if verbose { "app_backup=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
