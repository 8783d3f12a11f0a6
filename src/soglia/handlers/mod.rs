pub mod dashboard;
pub mod health;
pub mod login;
pub mod logout;
pub mod session;

// common helpers for the handlers
use regex::Regex;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").map_or(false, |re| re.is_match(email))
}

/// Sanitize a post-sign-in redirect target.
///
/// Only local absolute paths are honored; anything else (external URLs,
/// scheme-relative `//host` tricks, relative paths) falls back to the
/// default landing route.
pub fn safe_redirect(target: Option<&str>, default: &str) -> String {
    match target {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => default.to_string(),
    }
}
