//! Graph storage backends.

pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;

use crate::types::{DependencyRef, PackageVertex, TableIdentifier, VersionRef, VertexKey};

/// Error type shared by all graph store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The `(identifier, version)` pair is already published with a
    /// different definition. Retryable: re-read the latest version and
    /// publish against the new number.
    #[error("version conflict: {identifier} version {version} is already published with different content")]
    VersionConflict {
        /// Identifier whose version slot is already taken.
        identifier: TableIdentifier,
        /// The contested version number.
        version: u32,
    },
    /// A stored definition no longer matches its recorded content hash.
    #[error("definition hash mismatch for {key}: stored {stored}, computed {computed}")]
    DefinitionHashMismatch {
        /// Key of the corrupt vertex.
        key: VertexKey,
        /// Hash recorded at publish time.
        stored: String,
        /// Hash of the definition as read back.
        computed: String,
    },
    /// The backend itself failed (connection, I/O, row decoding).
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap a backend-specific error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(error))
    }

    /// Wrap a backend failure that only exists as a message.
    #[cfg(feature = "postgres")]
    pub(crate) fn backend_msg(message: impl Into<String>) -> Self {
        Self::Backend(message.into().into())
    }
}

/// Trait for table graph storage backends.
///
/// Implementations must guarantee deterministic ordering of results;
/// in particular [`TableGraphStore::get_outgoing_edges`] returns edges
/// in declaration order, which resolution order depends on. All
/// methods take `&self`: implementations provide their own interior
/// mutability and make each call atomic with respect to concurrent
/// callers.
#[async_trait]
pub trait TableGraphStore: Send + Sync {
    /// Insert the vertex for `(identifier, version)` if absent.
    ///
    /// The definition is canonicalized before hashing or storage.
    /// Re-upserting an existing vertex with the same canonical content
    /// returns the stored vertex unchanged; different content fails
    /// with [`StoreError::VersionConflict`].
    async fn upsert_vertex(
        &self,
        identifier: &TableIdentifier,
        version: u32,
        definition: &str,
    ) -> Result<PackageVertex, StoreError>;

    /// Record a dependency edge from a vertex to a table reference.
    ///
    /// Duplicate edges (same source, same target reference) collapse
    /// to one; otherwise declaration order is preserved.
    async fn upsert_edge(&self, from: &VertexKey, to: DependencyRef) -> Result<(), StoreError>;

    /// Fetch a vertex by identifier and version reference.
    ///
    /// [`VersionRef::Latest`] selects the highest published version.
    /// Returns `Ok(None)` when the identifier is unknown or the pinned
    /// version was never published.
    async fn get_vertex(
        &self,
        identifier: &TableIdentifier,
        version: VersionRef,
    ) -> Result<Option<PackageVertex>, StoreError>;

    /// Outgoing dependency references of a vertex, in declaration
    /// order. Unknown keys yield an empty list.
    async fn get_outgoing_edges(&self, from: &VertexKey)
        -> Result<Vec<DependencyRef>, StoreError>;
}

pub use memory::InMemoryGraphStore;

#[cfg(feature = "postgres")]
pub use postgres::{
    PoolStats, PostgresConfig, PostgresGraphStore, TABLE_DEPENDENCIES_SCHEMA,
    TABLE_PACKAGES_SCHEMA,
};
