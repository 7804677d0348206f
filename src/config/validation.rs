//! Configuration validation logic
//!
//! Range and format checks run once after loading so the worker never
//! starts with a configuration it cannot honour.

use validator::ValidateEmail;

use crate::config::error::ConfigError;
use crate::config::settings::{
    ContactConfig, DatabaseConfig, EmailQueueConfig, LoggerSettings, ResendConfig, Settings,
    SmtpConfig,
};

/// Valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid log formats
const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

/// Shortest accepted stale-lock threshold; a send must be able to finish inside it
pub const MIN_STALE_LOCK_MS: u64 = 10_000;

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must be a PostgreSQL connection string
    /// - Pool sizes must be positive and min must not exceed max
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Set MAILER_DATABASE__URL or database.url.",
            ));
        }

        if !(self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")) {
            return Err(ConfigError::validation(
                "database.url",
                "Invalid database URL format. Expected postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::validation(
                "database.min_connections",
                format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Plain levels are checked strictly; anything with '=' is an EnvFilter directive
        if !self.level.contains('=')
            && !VALID_LOG_LEVELS.contains(&self.level.to_lowercase().as_str())
        {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        if self.file.enabled && self.file.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.file.format.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.file.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        Ok(())
    }
}

impl EmailQueueConfig {
    /// Validate queue settings
    ///
    /// # Validation Rules
    /// - Poll interval, batch size, max attempts and concurrency must be positive
    /// - Stale-lock threshold must be at least [`MIN_STALE_LOCK_MS`]
    /// - Backoff base must be positive and not exceed the cap
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "email_queue.poll_interval_ms",
                "Poll interval must be greater than 0.",
            ));
        }

        if self.batch_size == 0 {
            return Err(ConfigError::validation(
                "email_queue.batch_size",
                "Batch size must be at least 1.",
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::validation(
                "email_queue.max_attempts",
                "Max attempts must be at least 1.",
            ));
        }

        if self.stale_lock_ms < MIN_STALE_LOCK_MS {
            return Err(ConfigError::validation(
                "email_queue.stale_lock_ms",
                format!(
                    "Stale lock threshold must be at least {} ms, got {}.",
                    MIN_STALE_LOCK_MS, self.stale_lock_ms
                ),
            ));
        }

        if self.backoff_base_ms == 0 {
            return Err(ConfigError::validation(
                "email_queue.backoff_base_ms",
                "Backoff base must be greater than 0.",
            ));
        }

        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(ConfigError::validation(
                "email_queue.backoff_cap_ms",
                format!(
                    "Backoff cap ({}) cannot be lower than backoff base ({}).",
                    self.backoff_cap_ms, self.backoff_base_ms
                ),
            ));
        }

        if self.concurrency == 0 {
            return Err(ConfigError::validation(
                "email_queue.concurrency",
                "Concurrency must be at least 1.",
            ));
        }

        Ok(())
    }
}

impl ContactConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(address) = self.owner_address()
            && !address.validate_email()
        {
            return Err(ConfigError::validation(
                "contact.notification_email",
                format!("'{}' is not a valid email address.", address),
            ));
        }
        Ok(())
    }
}

impl ResendConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_configured() {
            return Ok(());
        }

        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigError::validation(
                "resend.base_url",
                "Resend base URL must start with http:// or https://.",
            ));
        }

        let from = self.from_email.trim();
        if !from.is_empty() && !sender_address(from).validate_email() {
            return Err(ConfigError::validation(
                "resend.from_email",
                format!("'{}' does not contain a valid sender address.", from),
            ));
        }

        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "resend",
                "Timeouts must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl SmtpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_configured() {
            return Ok(());
        }

        if self.port == 0 {
            return Err(ConfigError::validation("smtp.port", "SMTP port must be greater than 0."));
        }

        let from = self.sender();
        if from.is_empty() {
            return Err(ConfigError::validation(
                "smtp.from_email",
                "SMTP needs a sender. Set smtp.from_email or smtp.username.",
            ));
        }
        if !sender_address(from).validate_email() {
            return Err(ConfigError::validation(
                "smtp.from_email",
                format!("'{}' does not contain a valid sender address.", from),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::validation(
                "smtp.timeout_secs",
                "Timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

/// Extracts `addr` from `Display Name <addr>`, or returns the input unchanged.
fn sender_address(from: &str) -> &str {
    match (from.rfind('<'), from.rfind('>')) {
        (Some(start), Some(end)) if start < end => from[start + 1..end].trim(),
        _ => from,
    }
}

impl Settings {
    /// Validate all configuration settings, returning the first failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.database.validate()?;
        self.logger.validate()?;
        self.email_queue.validate()?;
        self.contact.validate()?;
        self.resend.validate()?;
        self.smtp.validate()?;
        Ok(())
    }
}
