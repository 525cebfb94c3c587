//! Workspace naming rules.

use crate::error::CoreError;

/// Name given to the workspace created automatically for every user.
pub const DEFAULT_WORKSPACE_NAME: &str = "Default";

/// Maximum length for a workspace name.
pub const MAX_WORKSPACE_NAME_LEN: usize = 100;

/// Validate a workspace name: non-empty after trimming and within length limit.
pub fn validate_workspace_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(
            "Workspace name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_WORKSPACE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Workspace name too long (max {MAX_WORKSPACE_NAME_LEN} chars)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert!(validate_workspace_name("Client A").is_ok());
        assert!(validate_workspace_name(DEFAULT_WORKSPACE_NAME).is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(validate_workspace_name("").is_err());
        assert!(validate_workspace_name("\t ").is_err());
        assert!(validate_workspace_name(&"w".repeat(101)).is_err());
    }
}
