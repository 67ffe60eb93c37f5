//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

/// Regex for validating tenant codes (a code is one materialized path segment)
static TENANT_CODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap()
});

/// Maximum length of a tenant code
pub const MAX_CODE_LENGTH: usize = 64;

/// Check a tenant code
pub fn is_valid_tenant_code(code: &str) -> bool {
    !code.is_empty() && code.len() <= MAX_CODE_LENGTH && TENANT_CODE_REGEX.is_match(code)
}

/// `validator` hook for tenant codes
pub fn validate_tenant_code(code: &str) -> Result<(), ValidationError> {
    if is_valid_tenant_code(code) {
        Ok(())
    } else {
        let mut err = ValidationError::new("tenant_code");
        err.message = Some(
            format!(
                "code must match [A-Za-z0-9][A-Za-z0-9._-]* and be at most {} characters",
                MAX_CODE_LENGTH
            )
            .into(),
        );
        Err(err)
    }
}
