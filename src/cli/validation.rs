//! CLI argument validation functions
//!
//! This module provides custom validation functions for CLI arguments
//! that go beyond what clap can validate automatically.

use std::fs;
use std::path::PathBuf;

/// Longest accepted contact id (matches the `contacts.id` column)
const MAX_CONTACT_ID_LENGTH: usize = 64;

/// Validate that a file path is accessible (exists and is readable)
pub fn validate_config_file_path(path_str: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(format!("Configuration file does not exist: '{}'", path_str));
    }

    if !path.is_file() {
        return Err(format!("Configuration path is not a file: '{}'", path_str));
    }

    match fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(e) => Err(format!("Cannot read configuration file '{}': {}", path_str, e)),
    }
}

/// Validate rollback steps is a positive number
pub fn validate_rollback_steps(steps_str: &str) -> Result<u32, String> {
    let steps: u32 = steps_str.parse().map_err(|_| {
        format!(
            "Rollback steps must be a valid positive number, got: '{}'",
            steps_str
        )
    })?;

    if steps == 0 {
        return Err("Rollback steps must be greater than 0".to_string());
    }

    if steps > 100 {
        return Err("Rollback steps cannot exceed 100".to_string());
    }

    Ok(steps)
}

/// Validate a contact id: non-blank, no whitespace, bounded length
pub fn validate_contact_id(id_str: &str) -> Result<String, String> {
    let id = id_str.trim();

    if id.is_empty() {
        return Err("Contact id cannot be empty".to_string());
    }

    if id.chars().any(char::is_whitespace) {
        return Err(format!("Contact id cannot contain whitespace: '{}'", id_str));
    }

    if id.len() > MAX_CONTACT_ID_LENGTH {
        return Err(format!(
            "Contact id is too long (maximum {} characters)",
            MAX_CONTACT_ID_LENGTH
        ));
    }

    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_file_path_validation() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(validate_config_file_path(path).unwrap(), file.path());

        assert!(validate_config_file_path("/definitely/not/here.toml").is_err());

        let dir = tempfile::tempdir().unwrap();
        let err = validate_config_file_path(dir.path().to_str().unwrap()).unwrap_err();
        assert!(err.contains("not a file"));
    }

    #[test]
    fn test_rollback_steps_validation_valid() {
        for steps_str in ["1", "5", "10", "50", "100"] {
            assert!(
                validate_rollback_steps(steps_str).is_ok(),
                "Steps {} should be valid",
                steps_str
            );
        }
    }

    #[test]
    fn test_rollback_steps_validation_invalid() {
        for steps_str in ["0", "101", "999", "-1", "abc", ""] {
            assert!(
                validate_rollback_steps(steps_str).is_err(),
                "Steps '{}' should be invalid",
                steps_str
            );
        }
    }

    #[test]
    fn test_contact_id_validation() {
        assert_eq!(validate_contact_id(" c-42 ").unwrap(), "c-42");
        assert_eq!(
            validate_contact_id("6f1c0d2e-8d7a-4c4b-9d55-0f4b1b7f6a10").unwrap(),
            "6f1c0d2e-8d7a-4c4b-9d55-0f4b1b7f6a10"
        );

        let too_long = "x".repeat(MAX_CONTACT_ID_LENGTH + 1);
        for id in ["", "   ", "two words", too_long.as_str()] {
            assert!(validate_contact_id(id).is_err(), "Id '{}' should be invalid", id);
        }
    }
}
