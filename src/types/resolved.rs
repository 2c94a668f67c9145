//! Output rows of dependency resolution.

use serde::{Deserialize, Serialize};

use super::{PackageVertex, TableIdentifier};

/// One fully pinned dependency produced by resolution.
///
/// The version is always concrete: any `latest` reference has already
/// been resolved against the graph by the time one of these exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDependency {
    /// Identifier of the resolved table.
    pub table_identifier: TableIdentifier,
    /// Concrete version the reference resolved to.
    pub version: u32,
    /// Canonical definition text of that version.
    pub definition: String,
}

impl From<&PackageVertex> for ResolvedDependency {
    fn from(vertex: &PackageVertex) -> Self {
        Self {
            table_identifier: vertex.table_identifier.clone(),
            version: vertex.version,
            definition: vertex.definition.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vertex_carries_pinned_version() {
        let identifier = TableIdentifier::parse("@bob/beasts").unwrap();
        let vertex = PackageVertex::new(identifier.clone(), 4, "Beast\n1: goblin");
        let resolved = ResolvedDependency::from(&vertex);
        assert_eq!(resolved.table_identifier, identifier);
        assert_eq!(resolved.version, 4);
        assert_eq!(resolved.definition, "Beast\n1: goblin");
    }
}
