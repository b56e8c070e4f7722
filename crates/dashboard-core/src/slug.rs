//! Slugs: normalized, URL-safe identifiers derived from display names.

use crate::error::CoreError;

/// Longest slug whose `org-` / `proj-` namespace still fits a DNS label.
pub const MAX_SLUG_LEN: usize = 58;

/// Derives a slug from a human readable name.
///
/// Lower-cases ASCII letters, turns `&` into `and` and collapses every run of
/// other characters into a single `-`. The result may be empty.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = true;

    for ch in input.replace('&', " and ").chars() {
        let c = ch.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }

    let mut slug = out.trim_end_matches('-').to_string();
    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
        slug = slug.trim_end_matches('-').to_string();
    }
    slug
}

/// Checks that `slug` is a valid DNS-label fragment.
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if slug.is_empty() {
        return Err(CoreError::invalid_name(slug, "must not be empty"));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(CoreError::invalid_name(
            slug,
            format!("must be at most {MAX_SLUG_LEN} characters"),
        ));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(CoreError::invalid_name(
            slug,
            "must contain only lowercase alphanumeric characters or '-'",
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(CoreError::invalid_name(
            slug,
            "must start and end with an alphanumeric character",
        ));
    }
    Ok(())
}
