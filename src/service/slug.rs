//! Organization slugs: lowercase ASCII letters and digits joined by single
//! dashes, [`MIN_LEN`] to [`MAX_LEN`] characters long.

use std::fmt::Display;

pub const MIN_LEN: usize = 3;
pub const MAX_LEN: usize = 63;

/// Base for names that carry no ASCII letters or digits, and padding for
/// names that fold to fewer than [`MIN_LEN`] characters.
const FALLBACK: &str = "org";

/// Lowercases the ASCII words of `input` and joins them with `-`, keeping at
/// most [`MAX_LEN`] characters.
fn fold(input: &str) -> String {
    let mut slug = String::with_capacity(input.len().min(MAX_LEN));
    let words = input
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty());

    for word in words {
        if !slug.is_empty() {
            if slug.len() + 1 >= MAX_LEN {
                break;
            }
            slug.push('-');
        }
        let room = MAX_LEN - slug.len();
        slug.extend(word.chars().take(room).map(|ch| ch.to_ascii_lowercase()));
        if slug.len() == MAX_LEN {
            break;
        }
    }
    slug
}

/// Normalizes a slug supplied by the caller, `None` when it folds to fewer
/// than [`MIN_LEN`] characters.
pub fn parse(input: &str) -> Option<String> {
    let slug = fold(input);
    (slug.len() >= MIN_LEN).then_some(slug)
}

/// Derives a slug from an organization name. Any non-empty name yields one:
/// `"HP"` becomes `hp-org` and `"東京大学"` becomes `org`.
pub fn derive(name: &str) -> String {
    let slug = fold(name);
    match slug.len() {
        0 => FALLBACK.to_string(),
        len if len < MIN_LEN => format!("{slug}-{FALLBACK}"),
        _ => slug,
    }
}

/// Appends `-{suffix}` to `base`, cutting the base short when the result
/// would exceed [`MAX_LEN`].
pub fn suffixed(base: &str, suffix: impl Display) -> String {
    let suffix = format!("-{suffix}");
    let room = MAX_LEN.saturating_sub(suffix.len());
    let base = base.get(..room).unwrap_or(base).trim_end_matches('-');
    format!("{base}{suffix}")
}
