//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects strings that are empty once surrounding whitespace is removed.
///
/// ```ignore
/// validate_not_blank("Court 3") // Ok
/// validate_not_blank("   ")     // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text() {
        assert!(validate_not_blank("volleyball").is_ok());
        assert!(validate_not_blank("  padded  ").is_ok());
    }

    #[test]
    fn rejects_blank() {
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t\n").is_err());
    }
}
