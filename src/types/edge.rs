//! Dependency declarations between table versions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{TableIdentifier, VersionRef};

/// A declared dependency from one table version to another table.
///
/// The target is an identifier plus a version reference rather than a
/// vertex key: `latest` references re-resolve against the live graph
/// every time they are traversed, so a consumer that pins nothing
/// always sees the newest published versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRef {
    /// Identifier of the table being depended on.
    pub table_identifier: TableIdentifier,
    /// Which version of that table to resolve.
    pub version: VersionRef,
}

impl DependencyRef {
    /// Dependency on a pinned version.
    pub fn pinned(table_identifier: TableIdentifier, version: u32) -> Self {
        Self {
            table_identifier,
            version: VersionRef::Version(version),
        }
    }

    /// Dependency on the highest published version at resolution time.
    pub fn latest(table_identifier: TableIdentifier) -> Self {
        Self {
            table_identifier,
            version: VersionRef::Latest,
        }
    }
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.table_identifier, self.version)
    }
}
