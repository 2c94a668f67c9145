//! Canonical table identifiers of the form `@username/slug`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pattern every canonical identifier must match: `@username/slug`
/// where both segments are non-empty runs of ASCII alphanumerics,
/// underscores, and hyphens.
const IDENTIFIER_PATTERN: &str = r"^@[a-zA-Z0-9_-]+/[a-zA-Z0-9_-]+$";

fn identifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(IDENTIFIER_PATTERN).expect("identifier pattern is valid"))
}

/// Error returned when a string is not a canonical table identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid table identifier: {input:?} (expected `@username/slug`)")]
pub struct InvalidIdentifierError {
    /// The rejected input.
    pub input: String,
}

/// Canonical reference to a table, `@username/slug`.
///
/// The identifier names a table across all of its versions and is the
/// unit of deduplication during dependency resolution: a resolution
/// result never contains two versions of the same identifier.
///
/// Identifiers order by username first, then slug, which gives stores
/// a stable iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableIdentifier {
    username: String,
    slug: String,
}

impl TableIdentifier {
    /// Build an identifier from its two segments.
    ///
    /// No validation is performed; use [`TableIdentifier::parse`] for
    /// untrusted input.
    pub fn new(username: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            slug: slug.into(),
        }
    }

    /// Parse the canonical `@username/slug` form.
    ///
    /// Rejects anything that does not match exactly: missing `@`,
    /// missing or extra `/`, empty segments, or characters outside
    /// `[a-zA-Z0-9_-]`.
    pub fn parse(input: &str) -> Result<Self, InvalidIdentifierError> {
        if !identifier_regex().is_match(input) {
            return Err(InvalidIdentifierError {
                input: input.to_string(),
            });
        }
        let Some((username, slug)) = input[1..].split_once('/') else {
            return Err(InvalidIdentifierError {
                input: input.to_string(),
            });
        };
        Ok(Self {
            username: username.to_string(),
            slug: slug.to_string(),
        })
    }

    /// Owner segment (the part between `@` and `/`).
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Table slug segment (the part after `/`).
    pub fn slug(&self) -> &str {
        &self.slug
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}/{}", self.username, self.slug)
    }
}

impl FromStr for TableIdentifier {
    type Err = InvalidIdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TableIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TableIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
