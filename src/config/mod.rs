//! Configuration management for mailer-rs
//!
//! Layered configuration loading:
//! 1. `default.toml` - base configuration
//! 2. `{environment}.toml` - environment-specific overrides
//! 3. `local.toml` - local overrides (not committed)
//! 4. `MAILER_*` environment variables

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use settings::{
    ContactConfig, DatabaseConfig, EmailQueueConfig, LoggerSettings, ResendConfig, Settings,
    SmtpConfig, SmtpSecurity,
};
