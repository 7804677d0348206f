//! Command executor for dispatching CLI commands
//!
//! This module provides the main entry point for executing CLI commands
//! after parsing and configuration loading.

use super::handlers::{EnqueueCommandHandler, MigrateCommandHandler, WorkCommandHandler};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::{AppError, AppResult};

/// Execute a CLI command with the given settings
///
/// Dispatches to the handler of the parsed subcommand; `work` runs when no
/// subcommand was given.
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    validate_command_args(cli)?;

    match cli.command_or_default() {
        Commands::Work { once, dry_run } => {
            WorkCommandHandler::new(settings)
                .execute(once, dry_run)
                .await
        }
        Commands::Enqueue {
            contact_id,
            no_owner,
            no_reply,
        } => {
            EnqueueCommandHandler::new(settings)
                .execute(&contact_id, no_owner, no_reply)
                .await
        }
        Commands::Migrate { dry_run, rollback } => {
            MigrateCommandHandler::new(settings)
                .execute(dry_run, rollback)
                .await
        }
    }
}

/// Validate command arguments before execution
fn validate_command_args(cli: &Cli) -> AppResult<()> {
    cli.validate().map_err(|reason| AppError::Validation {
        field: "cli_arguments".to_string(),
        reason,
    })?;

    if let Some(Commands::Migrate {
        rollback: Some(steps),
        ..
    }) = &cli.command
        && *steps > 50
    {
        tracing::warn!(
            steps,
            "Rolling back many migrations at once, consider smaller steps"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    #[test]
    fn test_validate_command_args() {
        let cli = Cli::try_parse_from(["mailer-rs", "work", "--once"]).unwrap();
        assert!(validate_command_args(&cli).is_ok());
    }

    #[test]
    fn test_validate_conflicting_args() {
        let cli = Cli {
            command: Some(Commands::Migrate {
                dry_run: true,
                rollback: Some(5),
            }),
            config: None,
            env: None,
            verbose: false,
            quiet: false,
        };

        assert!(matches!(
            validate_command_args(&cli),
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_execute_default_command_needs_provider() {
        let cli = Cli::try_parse_from(["mailer-rs"]).unwrap();

        let result = execute_command(&cli, create_valid_config()).await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_execute_enqueue_with_nothing_enabled() {
        let cli = Cli::try_parse_from(["mailer-rs", "enqueue", "--contact-id", "c-1", "--no-reply"])
            .unwrap();
        // No owner address configured, and the reply is switched off by flag
        let result = execute_command(&cli, create_valid_config()).await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}
