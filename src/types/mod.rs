//! Core types for the table dependency graph.

pub mod edge;
pub mod identifier;
pub mod resolved;
pub mod vertex;

pub use edge::DependencyRef;
pub use identifier::{InvalidIdentifierError, TableIdentifier};
pub use resolved::ResolvedDependency;
pub use vertex::{InvalidVersionRef, PackageVertex, VersionRef, VertexKey};
