//! Core types and error handling for tmplver.
//!
//! - [`error`] - the [`EngineError`] taxonomy and user-friendly [`ErrorContext`]
//! - [`validate_template_id`] - identifier rules shared by the store backends

pub mod error;

pub use error::{EngineError, EngineResult, ErrorContext, user_friendly_error};

/// Validate a template identifier.
///
/// Identifiers become directory names in the file backend, so they are limited
/// to ASCII letters, digits, `.`, `_` and `-`, and may not start with `.`.
///
/// # Examples
///
/// ```rust
/// use tmplver::core::validate_template_id;
///
/// assert!(validate_template_id("react-app").is_ok());
/// assert!(validate_template_id("../etc").is_err());
/// ```
pub fn validate_template_id(template_id: &str) -> EngineResult<()> {
    let reject = |reason: &str| {
        Err(EngineError::InvalidTemplateId {
            template_id: template_id.to_string(),
            reason: reason.to_string(),
        })
    };

    if template_id.is_empty() {
        return reject("identifier is empty");
    }
    if template_id.starts_with('.') {
        return reject("identifier may not start with '.'");
    }
    if let Some(c) = template_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return reject(&format!("character '{c}' is not allowed"));
    }

    Ok(())
}
