//! Configuration merger for CLI arguments and config files
//!
//! This module handles merging CLI argument overrides with file-based configuration,
//! implementing the configuration precedence logic.

use super::parser::Cli;
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, settings::Settings};

/// Applies CLI overrides on top of file-based configuration
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base configuration, honouring `--config` and `--env`
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut loader = ConfigLoader::new()?;

        if let Some(env) = cli.env {
            loader = loader.with_environment(env.into());
        }
        if let Some(ref path) = cli.config {
            loader = loader.with_config_file(path);
        }

        Ok(Self::new(loader.load()?))
    }

    /// Merge CLI arguments with the base configuration
    ///
    /// CLI arguments have the highest priority; the result is validated again.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn create_valid_base_config() -> Settings {
        let mut config = Settings::default();
        config.database.url = "postgres://localhost/test".to_string();
        config
    }

    #[test]
    fn test_configuration_merger_without_flags_keeps_base() {
        let base_config = create_valid_base_config();
        let merger = ConfigurationMerger::new(base_config.clone());
        let cli = Cli::try_parse_from(["mailer-rs"]).unwrap();
        assert_eq!(merger.merge_cli_args(&cli).unwrap(), base_config);
    }

    #[test]
    fn test_configuration_merger_merge_verbose_flag() {
        let merger = ConfigurationMerger::new(create_valid_base_config());

        let cli = Cli::try_parse_from(["mailer-rs", "--verbose"]).unwrap();
        let merged_config = merger.merge_cli_args(&cli).unwrap();

        assert_eq!(merged_config.logger.level, "debug");
    }

    #[test]
    fn test_configuration_merger_merge_quiet_flag() {
        let merger = ConfigurationMerger::new(create_valid_base_config());

        let cli = Cli::try_parse_from(["mailer-rs", "--quiet", "work", "--once"]).unwrap();
        let merged_config = merger.merge_cli_args(&cli).unwrap();

        assert_eq!(merged_config.logger.level, "error");
    }

    #[test]
    fn test_configuration_merger_keeps_file_level_without_flags() {
        let mut base_config = create_valid_base_config();
        base_config.logger.level = "warn".to_string();
        let merger = ConfigurationMerger::new(base_config);

        let cli = Cli::try_parse_from(["mailer-rs", "migrate"]).unwrap();
        assert_eq!(merger.merge_cli_args(&cli).unwrap().logger.level, "warn");
    }

    #[test]
    fn test_configuration_merger_revalidates() {
        let mut base_config = create_valid_base_config();
        base_config.email_queue.batch_size = 0;
        let merger = ConfigurationMerger::new(base_config);

        let cli = Cli::try_parse_from(["mailer-rs"]).unwrap();
        assert!(matches!(
            merger.merge_cli_args(&cli),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
