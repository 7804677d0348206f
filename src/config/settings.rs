//! Configuration settings structures for mailer-rs
//!
//! Every section can be loaded from TOML files and overridden through
//! `MAILER_<SECTION>__<KEY>` environment variables.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};
use crate::models::EmailJobType;

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "mailer-rs".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/mailer.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_batch_size() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    8
}

fn default_stale_lock_ms() -> u64 {
    300_000
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_backoff_cap_ms() -> u64 {
    600_000
}

fn default_concurrency() -> usize {
    1
}

fn default_resend_base_url() -> String {
    "https://api.resend.com".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout_secs() -> u64 {
    30
}

// ============================================================================
// Application Configuration
// ============================================================================

/// Application basic information configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

// ============================================================================
// Database Configuration
// ============================================================================

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections kept in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Run pending migrations before the worker starts
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

/// Console output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

/// File output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    /// Append to an existing file instead of truncating it
    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: true,
            format: default_log_format(),
        }
    }
}

/// Logger configuration as it appears in the configuration files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level or full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime [`LoggerConfig`].
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let format = self
            .file
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;

        let console = ConsoleConfig::new(self.console.enabled, self.console.colored);
        let file = FileConfig::new(
            self.file.enabled,
            PathBuf::from(self.file.path),
            self.file.append,
            format,
        );

        LoggerConfig::new(console, file, self.level)
            .map_err(|e| ConfigError::validation("logger", e.to_string()))
    }
}

// ============================================================================
// Email Queue Configuration
// ============================================================================

/// Poll loop, retry and lock settings of the email queue worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailQueueConfig {
    /// Whether the `work` command starts the poll loop
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay between the end of one tick and the start of the next
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of jobs claimed per tick
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Failed attempts after which a job is dead-lettered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Age after which an IN_PROGRESS lock is presumed orphaned
    #[serde(default = "default_stale_lock_ms")]
    pub stale_lock_ms: u64,

    /// Delay before the first retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound of any retry delay
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Jobs of one batch processed in parallel (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl EmailQueueConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for EmailQueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            stale_lock_ms: default_stale_lock_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            concurrency: default_concurrency(),
        }
    }
}

// ============================================================================
// Contact Email Configuration
// ============================================================================

/// Which emails a contact form submission produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Owner address notified of new messages; empty disables the notification
    #[serde(default)]
    pub notification_email: String,

    /// Send an automatic acknowledgement to the visitor
    #[serde(default = "default_true")]
    pub send_reply_to_sender: bool,
}

impl ContactConfig {
    /// Trimmed owner address, `None` when notifications are disabled.
    pub fn owner_address(&self) -> Option<&str> {
        let address = self.notification_email.trim();
        (!address.is_empty()).then_some(address)
    }

    /// Job types enqueued for each contact submission.
    pub fn enabled_variants(&self) -> BTreeSet<EmailJobType> {
        let mut variants = BTreeSet::new();
        if self.owner_address().is_some() {
            variants.insert(EmailJobType::ContactNotifyOwner);
        }
        if self.send_reply_to_sender {
            variants.insert(EmailJobType::ContactReplySender);
        }
        variants
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            notification_email: String::new(),
            send_reply_to_sender: true,
        }
    }
}

// ============================================================================
// Resend Provider Configuration
// ============================================================================

/// Resend HTTP API settings; an empty API key disables the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendConfig {
    #[serde(default)]
    pub api_key: String,

    /// Sender, e.g. `Portfolio <noreply@example.com>`
    #[serde(default)]
    pub from_email: String,

    #[serde(default = "default_resend_base_url")]
    pub base_url: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Open a connection to the API when the worker starts
    #[serde(default = "default_true")]
    pub warm_up: bool,
}

impl ResendConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for ResendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            from_email: String::new(),
            base_url: default_resend_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            warm_up: true,
        }
    }
}

// ============================================================================
// SMTP Provider Configuration
// ============================================================================

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS (port 587)
    #[default]
    Starttls,
    /// TLS from the first byte (port 465)
    Tls,
    /// No encryption; local relays only
    #[serde(rename = "none")]
    Plain,
}

/// SMTP relay used when no Resend API key is set; an empty host disables it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Sender; the username is used when empty
    #[serde(default)]
    pub from_email: String,

    #[serde(default)]
    pub security: SmtpSecurity,

    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,

    /// Open and check a connection when the worker starts
    #[serde(default = "default_true")]
    pub warm_up: bool,
}

impl SmtpConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// `from_email`, or the username when no explicit sender is set
    pub fn sender(&self) -> &str {
        let from = self.from_email.trim();
        if from.is_empty() { self.username.trim() } else { from }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_email: String::new(),
            security: SmtpSecurity::default(),
            timeout_secs: default_smtp_timeout_secs(),
            warm_up: true,
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub email_queue: EmailQueueConfig,

    #[serde(default)]
    pub contact: ContactConfig,

    #[serde(default)]
    pub resend: ResendConfig,

    #[serde(default)]
    pub smtp: SmtpConfig,
}
