//! CLI argument parsing with clap
//!
//! This module defines the command-line interface structure using clap,
//! including all commands, arguments, and their documentation.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::build;

/// Persistent outbound email delivery queue
#[derive(Parser, Debug)]
#[command(name = "mailer-rs")]
#[command(about = "Persistent outbound email delivery queue")]
#[command(long_about = "
mailer-rs delivers the emails triggered by contact form submissions through a
durable job queue. Jobs are stored in PostgreSQL, claimed by one or more
workers and retried with exponential backoff until they are sent or exhausted.

EXAMPLES:
    # Run the worker poll loop
    mailer-rs work

    # Run a single tick and exit
    mailer-rs work --once

    # Show what the next tick would pick up without touching any job
    mailer-rs work --dry-run

    # Enqueue the emails for an existing contact
    mailer-rs enqueue --contact-id 6f1c0d2e

    # Use a custom configuration file in production mode
    mailer-rs --config /etc/mailer-rs/config.toml --env production work

    # Apply or preview database migrations
    mailer-rs migrate
    mailer-rs migrate --dry-run

    # Rollback the last migration
    mailer-rs migrate --rollback 1
")]
#[command(version = build::CLAP_LONG_VERSION)]
pub struct Cli {
    /// Subcommand to execute (defaults to `work`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Load a single TOML file instead of the layered `config/` directory.
    /// `MAILER_*` environment variables still apply on top of it.
    /// The file must exist and be readable.
    ///
    /// Example: --config /etc/mailer-rs/production.toml
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Selects which `{environment}.toml` layer is loaded, taking precedence
    /// over `MAILER_APP_ENV`.
    ///
    /// Available values: development (dev), test, staging (stage), production (prod)
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging
    ///
    /// Raises the log level to debug. Cannot be used with --quiet.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    ///
    /// Lowers the log level to error. Cannot be used with --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the email queue worker (default)
    ///
    /// Reclaims stale locks, claims due jobs and delivers them through the
    /// configured provider, once per poll interval, until Ctrl+C or SIGTERM.
    ///
    /// Examples:
    ///   mailer-rs work             # Poll until stopped
    ///   mailer-rs work --once      # Run a single tick
    ///   mailer-rs work --dry-run   # Report due and stale jobs only
    Work {
        /// Run exactly one tick and exit
        #[arg(long)]
        once: bool,

        /// Report the jobs the next tick would touch without changing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Enqueue contact emails for an existing contact
    ///
    /// Creates one PENDING job per enabled email type. The enabled types come
    /// from the `[contact]` configuration and can be narrowed with flags.
    ///
    /// Examples:
    ///   mailer-rs enqueue --contact-id 6f1c0d2e
    ///   mailer-rs enqueue --contact-id 6f1c0d2e --no-reply
    Enqueue {
        /// Id of the contact row the emails are about
        #[arg(long, value_name = "ID", value_parser = super::validation::validate_contact_id)]
        contact_id: String,

        /// Skip the owner notification
        #[arg(long)]
        no_owner: bool,

        /// Skip the auto-reply to the sender
        #[arg(long)]
        no_reply: bool,
    },
    /// Database migration operations
    ///
    /// Manage database schema migrations. This command connects to the configured
    /// database and applies or rolls back schema changes.
    ///
    /// Examples:
    ///   mailer-rs migrate                    # Apply all pending migrations
    ///   mailer-rs migrate --dry-run          # Show pending migrations without applying
    ///   mailer-rs migrate --rollback 3       # Rollback the last 3 migrations
    Migrate {
        /// Show pending migrations without applying
        ///
        /// Cannot be used with --rollback.
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to rollback
        ///
        /// Reverts the specified number of most recent migrations.
        /// Use with caution as this can result in data loss.
        /// Must be between 1 and 100.
        ///
        /// Example: --rollback 2 (reverts last 2 migrations)
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = super::validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Work {
            once: false,
            dry_run: false,
        }
    }
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

impl Cli {
    /// The subcommand to run, `work` when none was given
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or_default()
    }

    /// Validate CLI arguments and provide detailed error messages
    ///
    /// Covers combinations clap cannot express on its own.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(Commands::Migrate { dry_run, rollback }) = &self.command
            && *dry_run
            && rollback.is_some()
        {
            return Err("Cannot use --dry-run and --rollback together".to_string());
        }

        if let Some(Commands::Work { once, dry_run }) = &self.command
            && *once
            && *dry_run
        {
            return Err("Cannot use --once and --dry-run together".to_string());
        }

        if let Some(Commands::Enqueue {
            no_owner, no_reply, ..
        }) = &self.command
            && *no_owner
            && *no_reply
        {
            return Err("--no-owner and --no-reply together leave nothing to enqueue".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use --verbose and --quiet together".to_string());
        }

        Ok(())
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_help_flag() {
        let err = Cli::try_parse_from(["mailer-rs", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["mailer-rs", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_default_behavior_is_work() {
        let cli = Cli::try_parse_from(["mailer-rs"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(
            cli.command_or_default(),
            Commands::Work {
                once: false,
                dry_run: false
            }
        );
        assert!(!cli.verbose);
        assert!(!cli.quiet);
        assert!(cli.config.is_none());
        assert!(cli.env.is_none());
    }

    #[test]
    fn test_work_command_flags() {
        let cli = Cli::try_parse_from(["mailer-rs", "work", "--once"]).unwrap();
        assert_eq!(
            cli.command_or_default(),
            Commands::Work {
                once: true,
                dry_run: false
            }
        );

        let cli = Cli::try_parse_from(["mailer-rs", "work", "--once", "--dry-run"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_enqueue_command() {
        let cli = Cli::try_parse_from([
            "mailer-rs",
            "enqueue",
            "--contact-id",
            "c-42",
            "--no-reply",
        ])
        .unwrap();
        assert_eq!(
            cli.command_or_default(),
            Commands::Enqueue {
                contact_id: "c-42".to_string(),
                no_owner: false,
                no_reply: true,
            }
        );
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_enqueue_requires_contact_id() {
        let err = Cli::try_parse_from(["mailer-rs", "enqueue"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_enqueue_rejects_skipping_everything() {
        let cli = Cli::try_parse_from([
            "mailer-rs",
            "enqueue",
            "--contact-id",
            "c-42",
            "--no-owner",
            "--no-reply",
        ])
        .unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_migrate_command() {
        let cli = Cli::try_parse_from(["mailer-rs", "migrate", "--dry-run"]).unwrap();
        assert_eq!(
            cli.command_or_default(),
            Commands::Migrate {
                dry_run: true,
                rollback: None
            }
        );
    }

    #[test]
    fn test_environment_aliases() {
        let cli = Cli::try_parse_from(["mailer-rs", "--env", "prod", "work"]).unwrap();
        assert_eq!(cli.env, Some(Environment::Production));
        assert_eq!(
            crate::config::Environment::from(Environment::Staging),
            crate::config::Environment::Staging
        );
    }

    #[test]
    fn test_conflicting_verbose_quiet() {
        let err = Cli::try_parse_from(["mailer-rs", "--verbose", "--quiet"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }
}
