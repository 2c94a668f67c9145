//! Composition of a root definition with its resolved dependencies.
//!
//! Composition is purely textual and deterministic: the same root
//! definition and resolved list always produce byte-identical output,
//! with no graph access involved.

use crate::text;
use crate::types::{ResolvedDependency, TableIdentifier};

/// Marker prefixed to every dependency block, immediately followed by
/// the owning table's identifier.
pub const NAMESPACE_PRAGMA: &str = "@@PRAGMA namespace=";

/// Error cases surfaced while stitching dependency definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComposerError {
    /// A resolved dependency has no content after canonicalization.
    #[error("dependency {identifier} has an empty definition")]
    EmptyDefinition {
        /// Identifier of the offending dependency.
        identifier: TableIdentifier,
    },
    /// A dependency definition contains a whitespace-only block, which
    /// would leave a namespace pragma with nothing under it.
    #[error("dependency {identifier} contains an empty block")]
    EmptyBlock {
        /// Identifier of the offending dependency.
        identifier: TableIdentifier,
    },
}

/// Compose a root definition with its resolved dependencies.
///
/// The canonical root comes first, followed by one namespaced section
/// per dependency in resolution order, all joined with blank lines.
/// Every blank-line-separated block of every dependency is prefixed
/// with a `@@PRAGMA namespace=` line naming its source table, so
/// identically named entries from different tables stay
/// distinguishable downstream.
///
/// With no dependencies the output is exactly the canonical root.
pub fn compose(
    root_definition: &str,
    dependencies: &[ResolvedDependency],
) -> Result<String, ComposerError> {
    let root = text::normalize_definition(root_definition);
    if dependencies.is_empty() {
        return Ok(root);
    }

    let mut sections = Vec::with_capacity(dependencies.len() + 1);
    sections.push(root);
    for dependency in dependencies {
        sections.push(namespaced_section(dependency)?);
    }
    Ok(sections.join("\n\n"))
}

/// Prefix every block of one dependency with its namespace pragma.
fn namespaced_section(dependency: &ResolvedDependency) -> Result<String, ComposerError> {
    let canonical = text::normalize_definition(&dependency.definition);
    if canonical.is_empty() {
        return Err(ComposerError::EmptyDefinition {
            identifier: dependency.table_identifier.clone(),
        });
    }

    let pragma = format!("{NAMESPACE_PRAGMA}{}", dependency.table_identifier);
    let blocks: Vec<String> = canonical
        .split("\n\n")
        .map(|block| {
            if block.trim().is_empty() {
                Err(ComposerError::EmptyBlock {
                    identifier: dependency.table_identifier.clone(),
                })
            } else {
                Ok(format!("{pragma}\n{block}"))
            }
        })
        .collect::<Result<_, _>>()?;
    Ok(blocks.join("\n\n"))
}
