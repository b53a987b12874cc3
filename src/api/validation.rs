//! Input validation for API requests.
//!
//! Validators return `Result<(), String>` so handlers can collect several
//! failures with `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{InvitedVoter, ResultDisplay, SessionMode};

lazy_static! {
    /// Something before and after a single '@', no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+$").unwrap();
}

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_URL_LEN: usize = 2048;

/// Validate a required, already trimmed, title or name
pub fn validate_title(value: &str, label: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(format!("{} is required", label));
    }

    if value.chars().count() > MAX_TITLE_LEN {
        return Err(format!(
            "{} is too long (max {} characters)",
            label, MAX_TITLE_LEN
        ));
    }

    Ok(())
}

/// Validate an optional description
pub fn validate_description(description: &Option<String>) -> Result<(), String> {
    if let Some(d) = description {
        if d.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(format!(
                "Description is too long (max {} characters)",
                MAX_DESCRIPTION_LEN
            ));
        }
    }

    Ok(())
}

/// Validate an optional photo URL
pub fn validate_photo_url(photo_url: &Option<String>) -> Result<(), String> {
    if let Some(url) = photo_url {
        if url.len() > MAX_URL_LEN {
            return Err(format!("Photo URL is too long (max {} characters)", MAX_URL_LEN));
        }
    }

    Ok(())
}

/// Validate a normalized email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() || !EMAIL_REGEX.is_match(email) {
        return Err("Valid email is required".to_string());
    }

    Ok(())
}

/// Parse a required session mode
pub fn parse_mode(mode: &Option<String>) -> Result<SessionMode, String> {
    mode.as_deref()
        .and_then(|m| m.parse().ok())
        .ok_or_else(|| "Invalid mode. Must be \"casual\" or \"official\"".to_string())
}

/// Parse an optional result display, falling back to `default`
pub fn parse_result_display(
    result_display: &Option<String>,
    default: ResultDisplay,
) -> Result<ResultDisplay, String> {
    match result_display.as_deref() {
        None | Some("") => Ok(default),
        Some(value) => value.parse().map_err(|_| {
            "Invalid resultDisplay. Must be \"realtime\" or \"after-closes\"".to_string()
        }),
    }
}

/// Trim and drop empty strings
pub fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Emails sorted into accepted (normalized, first occurrence only), duplicate,
/// and invalid entries
#[derive(Debug, Default, PartialEq, Eq)]
pub struct EmailList {
    pub valid: Vec<String>,
    pub duplicates: Vec<String>,
    pub invalid: Vec<String>,
}

/// Normalize a batch of emails. Blank entries are skipped silently.
pub fn sort_emails<'a>(emails: impl IntoIterator<Item = &'a String>) -> EmailList {
    let mut list = EmailList::default();

    for raw in emails {
        let email = InvitedVoter::normalize_email(raw);
        if email.is_empty() {
            continue;
        }
        if validate_email(&email).is_err() {
            list.invalid.push(email);
        } else if list.valid.contains(&email) {
            list.duplicates.push(email);
        } else {
            list.valid.push(email);
        }
    }

    list
}
