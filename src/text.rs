//! Text canonicalization, content hashing, and key slugification.
//!
//! Every definition entering the system passes through
//! [`normalize_definition`] at the storage boundary, so hashing and
//! composition always see the same bytes regardless of the platform
//! that authored the text.

use sha2::{Digest, Sha256};

/// Canonicalize definition text.
///
/// Converts CRLF and bare CR line endings to LF and trims leading and
/// trailing whitespace. Interior blank lines are preserved; they are
/// significant block separators during composition.
pub fn normalize_definition(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// SHA-256 hash of the canonical form of `text`, hex-encoded.
///
/// Normalization happens before hashing, so the hash is stable across
/// line-ending and surrounding-whitespace differences.
pub fn definition_hash(text: &str) -> String {
    let canonical = normalize_definition(text);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Reduce arbitrary text to a lowercase hyphenated slug.
///
/// ASCII alphanumerics are kept, with uppercase lowered and a hyphen
/// inserted at lower-to-upper camelCase boundaries. Every other run of
/// characters collapses into a single hyphen, and leading or trailing
/// hyphens are dropped. `@bob/beasts-3` becomes `bob-beasts-3`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    let mut prev_lower_or_digit = false;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            } else if ch.is_ascii_uppercase() && prev_lower_or_digit {
                slug.push('-');
            }
            slug.push(ch.to_ascii_lowercase());
            prev_lower_or_digit = ch.is_ascii_lowercase() || ch.is_ascii_digit();
            pending_separator = false;
        } else {
            pending_separator = true;
            prev_lower_or_digit = false;
        }
    }

    slug
}
