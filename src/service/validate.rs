//! Field normalization and validation shared by the entity services.

use crate::{Error, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub const NAME_MAX: usize = 200;
pub const TEXT_MAX: usize = 1000;

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
}

pub fn valid_email(email: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(email))
}

/// Trims a required field, failing when it is empty or too long.
pub fn required(field: &str, value: &str, max: usize) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(Error::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(value.to_string())
}

/// Trims an optional field; blank input becomes `None`.
pub fn optional(field: &str, value: Option<&str>) -> Result<Option<String>> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > TEXT_MAX {
        return Err(Error::validation(format!(
            "{field} must be at most {TEXT_MAX} characters"
        )));
    }
    Ok(Some(value.to_string()))
}

/// Trims, lowercases and checks an email address.
pub fn email(field: &str, value: &str) -> Result<String> {
    let value = required(field, value, NAME_MAX)?.to_lowercase();
    if !valid_email(&value) {
        return Err(Error::validation(format!("{field} is not a valid email address")));
    }
    Ok(value)
}

pub fn optional_email(field: &str, value: Option<&str>) -> Result<Option<String>> {
    optional(field, value)?
        .map(|value| email(field, &value))
        .transpose()
}

/// Accepts absolute `http`/`https` URLs only.
pub fn optional_website(field: &str, value: Option<&str>) -> Result<Option<String>> {
    let Some(value) = optional(field, value)? else {
        return Ok(None);
    };
    match Url::parse(&value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
            Ok(Some(value))
        }
        _ => Err(Error::validation(format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

/// Maps a patch value to a column change: `None` keeps the column,
/// blank clears it.
pub fn patch(
    field: &str,
    value: Option<&str>,
    check: impl Fn(&str, Option<&str>) -> Result<Option<String>>,
) -> Result<Option<Option<String>>> {
    value.map(|value| check(field, Some(value))).transpose()
}

pub fn positive_id(field: &str, id: i64) -> Result<i64> {
    if id <= 0 {
        return Err(Error::validation(format!("{field} must be a positive integer")));
    }
    Ok(id)
}
