//! Admin configuration from environment variables.
//!
//! `ADMIN_USER_IDS` holds a comma-separated list of user ids. It is merged with the
//! `admins` list from config.toml so deployments can grant admin rights without editing
//! the file.

/// Parses a comma-separated id list, skipping blanks.
#[must_use]
pub fn parse_admin_ids(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Reads `ADMIN_USER_IDS` from the environment.
///
/// Returns an empty list when the variable is not set.
#[must_use]
pub fn admin_ids_from_env() -> Vec<String> {
    std::env::var("ADMIN_USER_IDS")
        .map(|raw| parse_admin_ids(&raw))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(
            parse_admin_ids(" 42, 43 ,,44 "),
            vec!["42".to_string(), "43".to_string(), "44".to_string()]
        );
        assert!(parse_admin_ids("").is_empty());
    }
}
