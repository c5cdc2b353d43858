pub mod commands;
pub mod context;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Encrypted, selective backup of browser and terminal-client login state.
#[derive(Parser, Debug)]
#[command(name = "app-backup", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the config file (default: ~/.config/app-backup/config.toml)
    #[arg(long, global = true, env = "APP_BACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose output (debug diagnostics on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode: only show errors and the run summary
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Archive, encrypt and store essential profile files
    Backup {
        /// Continue even if a target application is running
        #[arg(long)]
        force: bool,
        /// Commit the artifacts and push them to the remote
        #[arg(long)]
        push: bool,
        /// Only back up this application (repeatable)
        #[arg(long = "app", value_name = "ID")]
        apps: Vec<String>,
    },

    /// Decrypt stored artifacts and merge them into the live profiles
    Restore {
        /// Continue even if a target application is running
        #[arg(long)]
        force: bool,
        /// Update the local mirror from the remote first
        #[arg(long)]
        pull: bool,
        /// Only restore this application (repeatable)
        #[arg(long = "app", value_name = "ID")]
        apps: Vec<String>,
    },

    /// Show the mirror, remote and last run
    Status,

    /// List supported applications
    Apps,
}

/// `None` when no `--app` was given, so the configured set applies.
pub fn app_filter(apps: &[String]) -> Option<Vec<String>> {
    (!apps.is_empty()).then(|| apps.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backup_flags() {
        let cli = Cli::parse_from([
            "app-backup", "backup", "--force", "--push", "--app", "chrome", "--app", "firefox",
        ]);
        match cli.command {
            Commands::Backup { force, push, apps } => {
                assert!(force && push);
                assert_eq!(apps, vec!["chrome", "firefox"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["app-backup", "status", "--config", "/tmp/c.toml", "-q"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
        assert!(cli.quiet);
    }

    #[test]
    fn empty_app_filter_means_configured_set() {
        assert_eq!(app_filter(&[]), None);
        assert_eq!(app_filter(&["termius".into()]), Some(vec!["termius".to_string()]));
    }
}
