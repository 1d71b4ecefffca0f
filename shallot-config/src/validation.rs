// Configuration validation

use crate::{ConfigError, Result};

/// Trait for validating configuration
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Configuration validator with rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate that a value is not empty
    pub fn not_empty(value: &str, field: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "{} cannot be empty",
                field
            )));
        }
        Ok(())
    }

    /// Validate that a value is in a list of allowed values
    pub fn one_of<T: PartialEq + std::fmt::Debug>(
        value: &T,
        allowed: &[T],
        field: &str,
    ) -> Result<()> {
        if !allowed.contains(value) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be one of {:?}, got {:?}",
                field, allowed, value
            )));
        }
        Ok(())
    }

    /// Validate port number
    pub fn is_port(value: u16, field: &str) -> Result<()> {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be a valid port number",
                field
            )));
        }
        Ok(())
    }

    /// A URL prefix is either empty or starts with `/` and does not end with one.
    pub fn is_url_prefix(value: &str, field: &str) -> Result<()> {
        if value.is_empty() {
            return Ok(());
        }
        if !value.starts_with('/') || (value.len() > 1 && value.ends_with('/')) {
            return Err(ConfigError::ValidationError(format!(
                "{} must start with '/' and have no trailing slash, got {:?}",
                field, value
            )));
        }
        Ok(())
    }
}
