//! Form field normalization and validation.

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

/// Minimum number of digits in a phone number.
const MIN_PHONE_DIGITS: usize = 7;

/// Maximum number of digits in a phone number (E.164 allows 15, leave room for extensions).
const MAX_PHONE_DIGITS: usize = 20;

lazy_static! {
    static ref PHONE_PATTERN: Regex =
        Regex::new(r"^\+?[0-9 ().\-]+$").expect("phone pattern is valid");
}

/// Normalizes an email address into the matching key: trimmed and lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trims an optional form field, mapping blank values to `None`.
pub fn trimmed_or_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates a phone number.
///
/// Blank values pass here; presence is checked by the field's `length` rule.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.is_empty() {
        return Ok(());
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if PHONE_PATTERN.is_match(phone) && (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits) {
        Ok(())
    } else {
        let mut err = ValidationError::new("phone_format");
        err.message = Some("Phone number must contain 7-20 digits".into());
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("Jane@Example.com"), "jane@example.com");
        assert_eq!(normalize_email("  a@x.com \n"), "a@x.com");
        assert_eq!(normalize_email(""), "");
    }

    #[test]
    fn test_normalize_email_idempotent() {
        let once = normalize_email(" MiXeD@Case.ORG ");
        assert_eq!(normalize_email(&once), once);
    }

    #[test]
    fn test_trimmed_or_none() {
        assert_eq!(trimmed_or_none(None), None);
        assert_eq!(trimmed_or_none(Some("   ".to_string())), None);
        assert_eq!(
            trimmed_or_none(Some(" Acme Pty Ltd ".to_string())),
            Some("Acme Pty Ltd".to_string())
        );
    }

    #[test]
    fn test_validate_phone_accepts_common_formats() {
        assert!(validate_phone("0412 345 678").is_ok());
        assert!(validate_phone("+61 412 345 678").is_ok());
        assert!(validate_phone("(03) 9123-4567").is_ok());
        assert!(validate_phone("555.123.4567").is_ok());
    }

    #[test]
    fn test_validate_phone_blank_passes() {
        assert!(validate_phone("").is_ok());
    }

    #[test]
    fn test_validate_phone_rejects_letters() {
        assert!(validate_phone("call me maybe").is_err());
        assert!(validate_phone("0412 ABC 678").is_err());
    }

    #[test]
    fn test_validate_phone_digit_bounds() {
        assert!(validate_phone("123456").is_err());
        assert!(validate_phone("1234567").is_ok());
        assert!(validate_phone(&"1".repeat(21)).is_err());
    }

    #[test]
    fn test_validate_phone_error_message() {
        let err = validate_phone("12").unwrap_err();
        assert_eq!(
            err.message.unwrap().to_string(),
            "Phone number must contain 7-20 digits"
        );
    }
}
