//! Package vertices and version references.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::TableIdentifier;
use crate::text;

/// Reference to a version of a table.
///
/// On the wire a pinned version is a bare integer and the floating
/// reference is the string `"latest"`, matching how dependency
/// declarations are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionRef {
    /// A pinned version number. Versions start at 1.
    Version(u32),
    /// Whatever the highest published version is at lookup time.
    Latest,
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version(version) => write!(f, "{version}"),
            Self::Latest => f.write_str("latest"),
        }
    }
}

/// Error returned when a string is neither `"latest"` nor a version
/// number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version reference: {input:?} (expected a version number or \"latest\")")]
pub struct InvalidVersionRef {
    /// The rejected input.
    pub input: String,
}

impl FromStr for VersionRef {
    type Err = InvalidVersionRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "latest" {
            return Ok(Self::Latest);
        }
        s.parse::<u32>()
            .map(Self::Version)
            .map_err(|_| InvalidVersionRef {
                input: s.to_string(),
            })
    }
}

impl Serialize for VersionRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Version(version) => serializer.serialize_u32(*version),
            Self::Latest => serializer.serialize_str("latest"),
        }
    }
}

struct VersionRefVisitor;

impl Visitor<'_> for VersionRefVisitor {
    type Value = VersionRef;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a version number or the string \"latest\"")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        u32::try_from(value)
            .map(VersionRef::Version)
            .map_err(|_| E::custom(format!("version {value} out of range")))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        u32::try_from(value)
            .map(VersionRef::Version)
            .map_err(|_| E::custom(format!("version {value} out of range")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for VersionRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VersionRefVisitor)
    }
}

/// Storage key of a package vertex.
///
/// Derived deterministically from the identifier and version via
/// [`text::slugify`]: `@bob/beasts` at version 3 keys as
/// `bob-beasts-3`. Equal `(identifier, version)` pairs always derive
/// equal keys, which is what makes vertex upserts idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexKey(String);

impl VertexKey {
    /// Derive the key for an identifier at a concrete version.
    pub fn derive(identifier: &TableIdentifier, version: u32) -> Self {
        Self(text::slugify(&format!("{identifier}-{version}")))
    }

    /// Wrap a key that was previously derived and persisted.
    #[cfg_attr(not(feature = "postgres"), allow(dead_code))]
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    /// Key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VertexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One immutable published version of a table.
///
/// Vertices are append-only: once a `(table_identifier, version)` pair
/// is published, its definition never changes. Equality is by that
/// pair, not by content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVertex {
    /// Storage key derived from the identifier and version.
    pub key: VertexKey,
    /// Identifier of the table this version belongs to.
    pub table_identifier: TableIdentifier,
    /// Version number, starting at 1 and increasing by one per publish.
    pub version: u32,
    /// Canonical definition text (LF newlines, trimmed).
    pub definition: String,
    /// SHA-256 of the canonical definition, hex-encoded.
    pub definition_hash: String,
    /// When this version was published.
    pub published_at: DateTime<Utc>,
}

impl PackageVertex {
    /// Build the vertex for a new publish.
    ///
    /// The definition is canonicalized before the key and content hash
    /// are derived, so logically identical inputs produce identical
    /// vertices regardless of line endings or padding.
    pub fn new(table_identifier: TableIdentifier, version: u32, definition: &str) -> Self {
        let definition = text::normalize_definition(definition);
        let definition_hash = text::definition_hash(&definition);
        Self {
            key: VertexKey::derive(&table_identifier, version),
            table_identifier,
            version,
            definition,
            definition_hash,
            published_at: Utc::now(),
        }
    }
}

impl PartialEq for PackageVertex {
    fn eq(&self, other: &Self) -> bool {
        self.table_identifier == other.table_identifier && self.version == other.version
    }
}

impl Eq for PackageVertex {}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(raw: &str) -> TableIdentifier {
        TableIdentifier::parse(raw).unwrap()
    }

    #[test]
    fn test_version_ref_display() {
        assert_eq!(VersionRef::Version(3).to_string(), "3");
        assert_eq!(VersionRef::Latest.to_string(), "latest");
    }

    #[test]
    fn test_version_ref_from_str() {
        assert_eq!("latest".parse::<VersionRef>().unwrap(), VersionRef::Latest);
        assert_eq!("7".parse::<VersionRef>().unwrap(), VersionRef::Version(7));
        assert!("newest".parse::<VersionRef>().is_err());
        assert!("-1".parse::<VersionRef>().is_err());
    }

    #[test]
    fn test_version_ref_serializes_as_int_or_latest() {
        assert_eq!(serde_json::to_string(&VersionRef::Version(3)).unwrap(), "3");
        assert_eq!(
            serde_json::to_string(&VersionRef::Latest).unwrap(),
            "\"latest\""
        );
    }

    #[test]
    fn test_version_ref_deserializes_both_wire_forms() {
        assert_eq!(
            serde_json::from_str::<VersionRef>("3").unwrap(),
            VersionRef::Version(3)
        );
        assert_eq!(
            serde_json::from_str::<VersionRef>("\"latest\"").unwrap(),
            VersionRef::Latest
        );
    }

    #[test]
    fn test_version_ref_deserializes_numeric_strings() {
        assert_eq!(
            serde_json::from_str::<VersionRef>("\"12\"").unwrap(),
            VersionRef::Version(12)
        );
    }

    #[test]
    fn test_version_ref_rejects_invalid_values() {
        assert!(serde_json::from_str::<VersionRef>("-1").is_err());
        assert!(serde_json::from_str::<VersionRef>("4294967296").is_err());
        assert!(serde_json::from_str::<VersionRef>("\"newest\"").is_err());
        assert!(serde_json::from_str::<VersionRef>("1.5").is_err());
    }

    #[test]
    fn test_vertex_key_derivation() {
        let key = VertexKey::derive(&ident("@bob/beasts"), 3);
        assert_eq!(key.as_str(), "bob-beasts-3");
    }

    #[test]
    fn test_vertex_key_flattens_underscores() {
        let key = VertexKey::derive(&ident("@bob_smith/fey_court"), 12);
        assert_eq!(key.as_str(), "bob-smith-fey-court-12");
    }

    #[test]
    fn test_vertex_key_is_deterministic() {
        let a = VertexKey::derive(&ident("@alice/dragons"), 1);
        let b = VertexKey::derive(&ident("@alice/dragons"), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_new_vertex_canonicalizes_definition() {
        let vertex = PackageVertex::new(ident("@bob/beasts"), 1, "  Beast\r\n1: goblin\r\n");
        assert_eq!(vertex.definition, "Beast\n1: goblin");
        assert_eq!(vertex.key.as_str(), "bob-beasts-1");
    }

    #[test]
    fn test_equal_content_means_equal_hash() {
        let crlf = PackageVertex::new(ident("@bob/beasts"), 1, "Beast\r\n1: goblin");
        let lf = PackageVertex::new(ident("@bob/beasts"), 1, "Beast\n1: goblin");
        assert_eq!(crlf.definition_hash, lf.definition_hash);
    }

    #[test]
    fn test_vertex_equality_is_by_identifier_and_version() {
        let a = PackageVertex::new(ident("@bob/beasts"), 1, "goblin");
        let b = PackageVertex::new(ident("@bob/beasts"), 1, "orc");
        let c = PackageVertex::new(ident("@bob/beasts"), 2, "goblin");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_vertex_serde_round_trip() {
        let vertex = PackageVertex::new(ident("@bob/beasts"), 2, "Beast\n1: goblin");
        let json = serde_json::to_string(&vertex).unwrap();
        assert!(json.contains("\"tableIdentifier\":\"@bob/beasts\""));
        let back: PackageVertex = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vertex);
        assert_eq!(back.definition, vertex.definition);
    }
}
