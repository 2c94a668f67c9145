//! High-level publish, fetch, resolve, and compose operations.

use std::sync::Arc;

use crate::composer::{compose, ComposerError};
use crate::resolver::{DependencyResolver, ResolveError};
use crate::store::{StoreError, TableGraphStore};
use crate::types::{
    DependencyRef, PackageVertex, ResolvedDependency, TableIdentifier, VersionRef,
};

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Storage failed, or a publish lost a version race.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Dependency resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// Composition failed.
    #[error(transparent)]
    Compose(#[from] ComposerError),
}

/// Published-table registry over a graph store.
///
/// Owns a [`DependencyResolver`] and exposes the operations callers
/// actually perform: publish a version, fetch a version, resolve
/// dependencies, compose a document.
pub struct TableRegistry<S: TableGraphStore> {
    store: Arc<S>,
    resolver: DependencyResolver<S>,
}

impl<S: TableGraphStore> TableRegistry<S> {
    /// Create a registry with the default resolution depth bound.
    pub fn new(store: Arc<S>) -> Self {
        let resolver = DependencyResolver::new(Arc::clone(&store));
        Self { store, resolver }
    }

    /// Override the maximum dependency chain depth.
    pub fn with_max_depth(self, max_depth: usize) -> Self {
        Self {
            resolver: self.resolver.with_max_depth(max_depth),
            store: self.store,
        }
    }

    /// Publish the next version of a table.
    ///
    /// Reads the current latest version and claims `latest + 1` (1 for
    /// a first publish), stores the vertex, then records one edge per
    /// declared dependency. Two callers racing on the same identifier
    /// can claim the same number; the store arbitrates, and the loser
    /// sees [`StoreError::VersionConflict`] and may retry against the
    /// new latest.
    pub async fn publish_version(
        &self,
        identifier: &TableIdentifier,
        definition: &str,
        dependencies: &[DependencyRef],
    ) -> Result<PackageVertex, RegistryError> {
        let version = match self.store.get_vertex(identifier, VersionRef::Latest).await? {
            Some(latest) => latest.version + 1,
            None => 1,
        };
        let vertex = self
            .store
            .upsert_vertex(identifier, version, definition)
            .await?;
        for dependency in dependencies {
            self.store.upsert_edge(&vertex.key, dependency.clone()).await?;
        }
        tracing::info!(
            identifier = %identifier,
            version = vertex.version,
            dependencies = dependencies.len(),
            "published table version"
        );
        Ok(vertex)
    }

    /// Fetch one version of a table, [`VersionRef::Latest`] for the
    /// newest.
    pub async fn get_table_version(
        &self,
        identifier: &TableIdentifier,
        version: VersionRef,
    ) -> Result<Option<PackageVertex>, RegistryError> {
        Ok(self.store.get_vertex(identifier, version).await?)
    }

    /// Resolve the transitive dependencies of a root table.
    pub async fn resolve_dependencies(
        &self,
        root: &TableIdentifier,
        declared: &[DependencyRef],
    ) -> Result<Vec<ResolvedDependency>, RegistryError> {
        Ok(self.resolver.resolve(root, declared).await?)
    }

    /// Resolve and compose in one step.
    ///
    /// This is the read path an executor consumes: the root definition
    /// plus every transitive dependency, namespaced and joined into a
    /// single canonical document.
    pub async fn compose_document(
        &self,
        root: &TableIdentifier,
        root_definition: &str,
        declared: &[DependencyRef],
    ) -> Result<String, RegistryError> {
        let resolved = self.resolver.resolve(root, declared).await?;
        Ok(compose(root_definition, &resolved)?)
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
