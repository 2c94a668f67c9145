//! In-memory graph store for testing and embedded use.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{StoreError, TableGraphStore};
use crate::search::{CandidateIndex, SearchError};
use crate::types::{DependencyRef, PackageVertex, TableIdentifier, VersionRef, VertexKey};

/// In-memory graph store backed by ordered maps.
///
/// Uses BTreeMap for deterministic iteration order and a single
/// read-write lock for interior mutability, so concurrent upserts of
/// the same `(identifier, version)` serialize and exactly one writer
/// claims the slot.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    /// identifier -> version -> vertex.
    vertices: BTreeMap<TableIdentifier, BTreeMap<u32, PackageVertex>>,
    /// vertex key -> outgoing references, in declaration order.
    edges: BTreeMap<VertexKey, Vec<DependencyRef>>,
}

impl InMemoryGraphStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vertices across all identifiers.
    pub fn num_vertices(&self) -> usize {
        self.inner.read().vertices.values().map(BTreeMap::len).sum()
    }

    /// Number of stored edges.
    pub fn num_edges(&self) -> usize {
        self.inner.read().edges.values().map(Vec::len).sum()
    }

    /// All published identifiers, in sorted order.
    pub fn all_identifiers(&self) -> Vec<TableIdentifier> {
        self.inner.read().vertices.keys().cloned().collect()
    }
}

#[async_trait]
impl TableGraphStore for InMemoryGraphStore {
    async fn upsert_vertex(
        &self,
        identifier: &TableIdentifier,
        version: u32,
        definition: &str,
    ) -> Result<PackageVertex, StoreError> {
        let candidate = PackageVertex::new(identifier.clone(), version, definition);
        let mut inner = self.inner.write();
        let versions = inner.vertices.entry(identifier.clone()).or_default();
        match versions.get(&version) {
            Some(existing) if existing.definition_hash == candidate.definition_hash => {
                Ok(existing.clone())
            }
            Some(_) => Err(StoreError::VersionConflict {
                identifier: identifier.clone(),
                version,
            }),
            None => {
                versions.insert(version, candidate.clone());
                Ok(candidate)
            }
        }
    }

    async fn upsert_edge(&self, from: &VertexKey, to: DependencyRef) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let edges = inner.edges.entry(from.clone()).or_default();
        if !edges.contains(&to) {
            edges.push(to);
        }
        Ok(())
    }

    async fn get_vertex(
        &self,
        identifier: &TableIdentifier,
        version: VersionRef,
    ) -> Result<Option<PackageVertex>, StoreError> {
        let inner = self.inner.read();
        let Some(versions) = inner.vertices.get(identifier) else {
            return Ok(None);
        };
        let vertex = match version {
            VersionRef::Version(v) => versions.get(&v),
            VersionRef::Latest => versions.values().next_back(),
        };
        Ok(vertex.cloned())
    }

    async fn get_outgoing_edges(
        &self,
        from: &VertexKey,
    ) -> Result<Vec<DependencyRef>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.edges.get(from).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl CandidateIndex for InMemoryGraphStore {
    /// Case-insensitive substring match over published identifiers,
    /// in sorted identifier order. An empty query matches everything.
    async fn search(&self, query: &str) -> Result<Vec<TableIdentifier>, SearchError> {
        let needle = query.to_ascii_lowercase();
        let inner = self.inner.read();
        Ok(inner
            .vertices
            .keys()
            .filter(|identifier| {
                identifier.to_string().to_ascii_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}
