use std::sync::OnceLock;

use regex::Regex;

use super::error::ProcurementError;

/// Addresses collected by intake forms when the supplier left the field blank.
const PLACEHOLDER_EMAILS: &[&str] = &[
    "no-email@example.com",
    "noemail@example.com",
    "placeholder@example.com",
    "unknown@example.com",
];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

/// local-part "@" domain "." tld, without whitespace.
pub(crate) fn is_valid_email(raw: &str) -> bool {
    email_pattern().is_match(raw.trim())
}

pub(crate) fn is_placeholder_email(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    PLACEHOLDER_EMAILS.contains(&normalized.as_str())
}

/// Trimmed, non-empty value or a validation error naming the field.
pub(crate) fn required(field: &str, value: Option<String>) -> Result<String, ProcurementError> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
        .ok_or_else(|| ProcurementError::validation(format!("{field} is required")))
}

pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

pub(crate) fn contact_email(value: &str) -> Result<(), ProcurementError> {
    if is_valid_email(value) {
        Ok(())
    } else {
        Err(ProcurementError::validation(format!(
            "contactEmail '{value}' is not a valid email address"
        )))
    }
}

pub(crate) fn bid_amount(value: f64) -> Result<f64, ProcurementError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ProcurementError::validation(
            "totalBidAmount must be a non-negative number",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("  procurement.officer@ministry.gov.example  "));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for candidate in ["", "plain", "a@b", "@b.com", "a b@c.com", "a@b .com"] {
            assert!(!is_valid_email(candidate), "{candidate:?} should be rejected");
        }
    }

    #[test]
    fn placeholder_detection_is_case_insensitive() {
        assert!(is_placeholder_email("No-Email@Example.com"));
        assert!(!is_placeholder_email("x@y.com"));
    }

    #[test]
    fn required_trims_and_names_the_field() {
        assert_eq!(
            required("companyName", Some("  Acme ".to_string())).expect("present"),
            "Acme"
        );
        let err = required("companyName", Some("   ".to_string())).expect_err("blank");
        assert_eq!(err.to_string(), "companyName is required");
    }

    #[test]
    fn bid_amount_rejects_negative_and_nan() {
        assert!(bid_amount(0.0).is_ok());
        assert!(bid_amount(-1.0).is_err());
        assert!(bid_amount(f64::NAN).is_err());
    }
}
