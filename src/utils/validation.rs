use crate::utils::error::{DiscoveryError, Result};
use std::time::Duration;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DiscoveryError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// D-Bus object paths are absolute, slash-separated, with no empty or trailing elements.
pub fn validate_object_path(field_name: &str, path: &str) -> Result<()> {
    let invalid = |reason: &str| DiscoveryError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("Object path must start with '/'"));
    }
    if path == "/" {
        return Ok(());
    }
    if path.ends_with('/') || path.contains("//") {
        return Err(invalid("Object path cannot contain empty elements"));
    }
    if !path
        .chars()
        .all(|c| c == '/' || c == '_' || c.is_ascii_alphanumeric())
    {
        return Err(invalid("Object path may only contain [A-Za-z0-9_/]"));
    }
    Ok(())
}

pub fn validate_positive_duration(field_name: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(DiscoveryError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: format!("{:?}", value),
            reason: "Duration must be greater than zero".to_string(),
        });
    }
    Ok(())
}
