use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationErrors;

pub const MAX_STRING_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Required-field check; blank strings count as missing.
pub(crate) fn required<'a>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Some(v),
        _ => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
    }
}

pub(crate) fn check_name(errors: &mut ValidationErrors, name: &str) {
    if name.chars().count() > MAX_STRING_LEN {
        errors.add(
            "name",
            format!("The name field must not be greater than {MAX_STRING_LEN} characters."),
        );
    }
}

pub(crate) fn check_email(errors: &mut ValidationErrors, email: &str) {
    if !is_valid_email(email) {
        errors.add("email", "The email field must be a valid email address.");
    } else if email.chars().count() > MAX_STRING_LEN {
        errors.add(
            "email",
            format!("The email field must not be greater than {MAX_STRING_LEN} characters."),
        );
    }
}

pub(crate) fn check_password(errors: &mut ValidationErrors, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("The password field must be at least {MIN_PASSWORD_LEN} characters."),
        );
    }
}
