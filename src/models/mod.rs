//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! together with the request and response bodies built from them.

/// API keys, tiers and usage logs
pub mod api_key;
/// Coffee catalogue
pub mod coffee;
/// Orders, sizes, statuses and pricing
pub mod order;
/// Users and roles
pub mod user;

use crate::error::AppError;

/// Reject text longer than its `VARCHAR(max)` column, counted in characters.
pub(crate) fn check_max_chars(label: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::validation(format!(
            "{label} must be at most {max} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_max_chars_counts_characters() {
        assert!(check_max_chars("Name", "abc", 3).is_ok());
        assert!(check_max_chars("Name", "kopi ☕", 6).is_ok());

        let err = check_max_chars("Name", "abcd", 3).unwrap_err();
        assert_eq!(err.to_string(), "Name must be at most 3 characters");
    }
}
