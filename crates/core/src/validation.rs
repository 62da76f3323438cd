//! Field-level validation for plain text values.
//!
//! Callers hand the domain layer raw strings; these helpers normalize them
//! (trim, empty optional -> `None`) and enforce length limits measured in
//! characters.

use crate::error::{DomainError, DomainResult};

/// Limit for short names and titles.
pub const NAME_MAX: usize = 255;

/// Limit for descriptions and addresses.
pub const TEXT_MAX: usize = 1000;

/// Limit for URL-ish fields (logos, stored paths).
pub const URL_MAX: usize = 2000;

/// Require a non-blank value of at most `max` characters; returns it trimmed.
pub fn required_text(field: &str, value: &str, max: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    check_len(field, trimmed, max)?;
    Ok(trimmed.to_string())
}

/// Normalize an optional value: blank becomes `None`, anything else must fit `max`.
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> DomainResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => {
            check_len(field, v, max)?;
            Ok(Some(v.to_string()))
        }
    }
}

fn check_len(field: &str, value: &str, max: usize) -> DomainResult<()> {
    let len = value.chars().count();
    if len > max {
        return Err(DomainError::validation(format!(
            "{field} may not be greater than {max} characters (got {len})"
        )));
    }
    Ok(())
}
