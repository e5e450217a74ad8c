//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggests property names as the user types, so investment commands receive a name the
//! ledger can resolve.

use crate::{bot::Context, core::property};

/// Provides autocomplete suggestions for property names.
///
/// Matches active properties whose name contains the partial input (case-insensitive)
/// and returns up to 25 names, sorted alphabetically.
pub async fn autocomplete_property_name(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let db = &ctx.data().database;

    let Ok(properties) = property::get_all_active_properties(db).await else {
        return Vec::new();
    };

    let mut matching = filter_names(properties.into_iter().map(|p| p.name), partial);
    matching.sort();
    matching
}

fn filter_names(names: impl Iterator<Item = String>, partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    names
        .filter(|name| name.to_lowercase().contains(&partial_lower))
        .take(25) // Discord autocomplete limit
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_names() {
        let names = ["Harbour View", "Hillside Lofts", "Riverside"].map(String::from);
        assert_eq!(
            filter_names(names.clone().into_iter(), "side"),
            vec!["Hillside Lofts".to_string(), "Riverside".to_string()]
        );
        assert_eq!(filter_names(names.into_iter(), "HARB").len(), 1);

        let many = (0..40).map(|i| format!("Tower {i}"));
        assert_eq!(filter_names(many, "tower").len(), 25);
    }
}
