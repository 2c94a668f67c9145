//! # table-registry
//!
//! Versioned table packages with recursive dependency resolution and
//! deterministic namespaced composition.
//!
//! A *table* is a block of generator text published in immutable,
//! monotonically numbered versions. Tables reference other tables, by
//! pinned version or by a floating `latest`, and the registry walks
//! that graph to gather everything a root table needs to execute.
//!
//! ## Core Contract
//!
//! 1. Versions are append-only: a published `(identifier, version)`
//!    pair never changes, and a new publish claims `latest + 1`
//! 2. Resolution is deterministic: depth-first in declaration order,
//!    first resolution of an identifier wins, equal graph states give
//!    identical results
//! 3. Failures are explicit: unknown references, cycles, and over-deep
//!    chains abort resolution with typed errors and no partial output
//! 4. Text is canonical: definitions are normalized (LF, trimmed) at
//!    the storage boundary, and composition is a pure function of its
//!    inputs
//!
//! ## Architecture
//!
//! ```text
//! TableRegistry (publish / fetch / resolve / compose)
//!       ├── DependencyResolver → depth-first walk, cycle + depth guards
//!       ├── compose()          → namespace pragmas + block stitching
//!       └── TableGraphStore    → InMemoryGraphStore | PostgresGraphStore
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use table_registry::{DependencyRef, InMemoryGraphStore, TableIdentifier, TableRegistry};
//!
//! # async fn demo() -> Result<(), table_registry::RegistryError> {
//! let registry = TableRegistry::new(Arc::new(InMemoryGraphStore::new()));
//!
//! let beasts = TableIdentifier::parse("@bob/beasts").unwrap();
//! registry.publish_version(&beasts, "Beast\n1: goblin", &[]).await?;
//!
//! let root = TableIdentifier::parse("@alice/encounters").unwrap();
//! let document = registry
//!     .compose_document(&root, "Encounter\n1: ambush", &[DependencyRef::latest(beasts)])
//!     .await?;
//! assert!(document.contains("@@PRAGMA namespace=@bob/beasts"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod text;
pub mod store;
pub mod resolver;
pub mod composer;
pub mod search;
pub mod registry;

// Re-exports
pub use types::{
    DependencyRef, InvalidIdentifierError, InvalidVersionRef, PackageVertex,
    ResolvedDependency, TableIdentifier, VersionRef, VertexKey,
};
pub use store::{InMemoryGraphStore, StoreError, TableGraphStore};
#[cfg(feature = "postgres")]
pub use store::{
    PoolStats, PostgresConfig, PostgresGraphStore, TABLE_DEPENDENCIES_SCHEMA,
    TABLE_PACKAGES_SCHEMA,
};
pub use resolver::{DependencyResolver, ResolveError, DEFAULT_MAX_DEPTH};
pub use composer::{compose, ComposerError, NAMESPACE_PRAGMA};
pub use search::{CandidateIndex, CandidateSearch, SearchError};
pub use registry::{RegistryError, TableRegistry};
pub use text::{definition_hash, normalize_definition, slugify};
