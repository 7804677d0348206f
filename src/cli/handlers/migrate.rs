//! Migrate command handler
//!
//! Applies, previews or reverts the embedded schema migrations. Diesel's
//! migration harness is synchronous, so every operation runs on a blocking
//! thread with its own `PgConnection`.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::MigrationHarness;

use crate::config::settings::Settings;
use crate::db::MIGRATIONS;
use crate::error::{AppError, AppResult};

/// Handler for the migrate command
pub struct MigrateCommandHandler {
    config: Settings,
}

impl MigrateCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Execute the migrate command with dry-run and rollback support
    ///
    /// # Errors
    /// - Database connection errors
    /// - Migration execution errors
    /// - `AppError::Validation` when `rollback` is 0 or exceeds the applied count
    pub async fn execute(&self, dry_run: bool, rollback: Option<u32>) -> AppResult<()> {
        if let Some(0) = rollback {
            return Err(AppError::Validation {
                field: "rollback_steps".to_string(),
                reason: "Number of rollback steps must be greater than 0".to_string(),
            });
        }

        self.config.database.validate()?;
        let url = self.config.database.url.clone();

        if dry_run {
            let pending = with_connection(url, "check pending migrations", |conn| {
                conn.pending_migrations(MIGRATIONS)
                    .map(|pending| pending.iter().map(|m| m.name().to_string()).collect::<Vec<_>>())
                    .map_err(|e| migration_error("check pending migrations", e))
            })
            .await?;

            if pending.is_empty() {
                println!("No pending migrations, database is up to date");
            } else {
                println!("Found {} pending migration(s):", pending.len());
                for name in &pending {
                    println!("  - {}", name);
                }
                println!("\nRun without --dry-run to apply them");
            }
            return Ok(());
        }

        if let Some(steps) = rollback {
            let reverted = with_connection(url, "rollback migrations", move |conn| {
                revert(conn, steps)
            })
            .await?;

            println!("Rolled back {} migration(s):", reverted.len());
            for name in &reverted {
                println!("  - {}", name);
            }
            tracing::info!(steps = reverted.len(), "Migrations rolled back");
            return Ok(());
        }

        let applied = run_pending_migrations(url).await?;
        if applied.is_empty() {
            println!("No migrations to apply, database is already up to date");
        } else {
            println!("Applied {} migration(s):", applied.len());
            for name in &applied {
                println!("  - {}", name);
            }
        }

        Ok(())
    }
}

/// Apply all pending migrations, returning the applied versions.
///
/// Also used by `work` when `database.auto_migrate` is set.
pub async fn run_pending_migrations(database_url: String) -> AppResult<Vec<String>> {
    let applied = with_connection(database_url, "run pending migrations", |conn| {
        conn.run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.iter().map(|v| v.to_string()).collect::<Vec<_>>())
            .map_err(|e| migration_error("run pending migrations", e))
    })
    .await?;

    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "Database migrations applied");
    }

    Ok(applied)
}

fn revert(conn: &mut PgConnection, steps: u32) -> AppResult<Vec<String>> {
    let applied = conn
        .applied_migrations()
        .map_err(|e| migration_error("get applied migrations", e))?;

    if applied.len() < steps as usize {
        return Err(AppError::Validation {
            field: "rollback_steps".to_string(),
            reason: format!(
                "Cannot rollback {} migrations - only {} applied migrations available",
                steps,
                applied.len()
            ),
        });
    }

    let mut reverted = Vec::with_capacity(steps as usize);
    for _ in 0..steps {
        let version = conn
            .revert_last_migration(MIGRATIONS)
            .map_err(|e| migration_error("revert migration", e))?;
        reverted.push(version.to_string());
    }

    Ok(reverted)
}

/// Runs `op` on a blocking thread with a fresh connection to `database_url`.
async fn with_connection<T, F>(database_url: String, operation: &'static str, op: F) -> AppResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = PgConnection::establish(&database_url).map_err(|e| AppError::Database {
            operation: format!("establish connection to {}", operation),
            source: anyhow::Error::from(e),
        })?;
        op(&mut conn)
    })
    .await
    .map_err(|e| AppError::Internal {
        source: anyhow::Error::from(e),
    })?
}

fn migration_error(
    operation: &str,
    error: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> AppError {
    AppError::Database {
        operation: operation.to_string(),
        source: anyhow::anyhow!(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_valid_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    #[tokio::test]
    async fn test_migrate_handler_zero_rollback_steps() {
        let handler = MigrateCommandHandler::new(create_valid_config());

        match handler.execute(false, Some(0)).await {
            Err(AppError::Validation { field, reason }) => {
                assert_eq!(field, "rollback_steps");
                assert!(reason.contains("must be greater than 0"));
            }
            other => panic!("Expected validation error for zero rollback steps, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_migrate_handler_requires_database_url() {
        let handler = MigrateCommandHandler::new(Settings::default());

        assert!(matches!(
            handler.execute(true, None).await,
            Err(AppError::Configuration { .. })
        ));
    }
}
