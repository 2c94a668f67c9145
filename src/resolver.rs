//! Recursive dependency resolution over the table graph.
//!
//! Resolution is a depth-first walk starting from a root table's
//! declared dependencies. It yields every transitive dependency
//! exactly once, in deterministic visit order, with `latest`
//! references pinned to concrete versions against the live graph.

use std::collections::HashSet;
use std::sync::Arc;

use crate::store::{StoreError, TableGraphStore};
use crate::types::{DependencyRef, ResolvedDependency, TableIdentifier, VertexKey};

/// Default bound on dependency chain depth.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Error cases surfaced by dependency resolution.
///
/// Every variant aborts the whole resolution; there are no partial
/// results.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// A declared or transitive reference points at a version that was
    /// never published.
    #[error("dependency not found: {reference}")]
    DependencyNotFound {
        /// The reference that failed to resolve.
        reference: DependencyRef,
    },
    /// The dependency graph loops back on itself.
    #[error("dependency cycle detected: {}", format_chain(.chain))]
    DependencyCycle {
        /// Identifier chain that closed the cycle, repeated entry last.
        chain: Vec<TableIdentifier>,
    },
    /// A dependency chain is deeper than the configured bound.
    #[error("dependency chain exceeds maximum depth of {max_depth}")]
    DepthExceeded {
        /// The configured bound that was crossed.
        max_depth: usize,
    },
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn format_chain(chain: &[TableIdentifier]) -> String {
    chain
        .iter()
        .map(TableIdentifier::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// One vertex currently being expanded, with its remaining references.
struct Frame {
    /// `None` for the synthetic root frame.
    key: Option<VertexKey>,
    identifier: TableIdentifier,
    references: Vec<DependencyRef>,
    next: usize,
}

/// Depth-first dependency resolver over a graph store.
///
/// Stateless between calls: `latest` references are looked up against
/// the store on every traversal step and never cached, so back-to-back
/// resolutions observe publishes that happen in between.
pub struct DependencyResolver<S: TableGraphStore> {
    store: Arc<S>,
    max_depth: usize,
}

impl<S: TableGraphStore> DependencyResolver<S> {
    /// Create a resolver with the default depth bound.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the maximum dependency chain depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve the transitive dependencies of `root`.
    ///
    /// `declared` are the root's own dependency declarations; the root
    /// itself is never part of the result. Output order is the visit
    /// order of the walk, so equal graph states always produce
    /// identical results. When the same identifier is reachable along
    /// several paths, the version reached first wins and later
    /// references to that identifier are skipped without descending.
    pub async fn resolve(
        &self,
        root: &TableIdentifier,
        declared: &[DependencyRef],
    ) -> Result<Vec<ResolvedDependency>, ResolveError> {
        let mut resolved: Vec<ResolvedDependency> = Vec::new();
        let mut resolved_identifiers: HashSet<TableIdentifier> = HashSet::new();
        let mut path_keys: HashSet<VertexKey> = HashSet::new();

        // The root seeds the walk as a synthetic frame, so any chain
        // that reaches back to the root's identifier closes a cycle
        // even though the version being resolved is not stored yet.
        let mut stack: Vec<Frame> = vec![Frame {
            key: None,
            identifier: root.clone(),
            references: declared.to_vec(),
            next: 0,
        }];

        while let Some(top) = stack.last_mut() {
            if top.next >= top.references.len() {
                if let Some(finished) = stack.pop() {
                    if let Some(key) = finished.key {
                        path_keys.remove(&key);
                    }
                }
                continue;
            }
            let reference = top.references[top.next].clone();
            top.next += 1;

            if reference.table_identifier == *root {
                return Err(ResolveError::DependencyCycle {
                    chain: cycle_chain(&stack, root),
                });
            }

            let vertex = self
                .store
                .get_vertex(&reference.table_identifier, reference.version)
                .await?
                .ok_or_else(|| ResolveError::DependencyNotFound {
                    reference: reference.clone(),
                })?;

            if path_keys.contains(&vertex.key) {
                return Err(ResolveError::DependencyCycle {
                    chain: cycle_chain(&stack, &vertex.table_identifier),
                });
            }

            if resolved_identifiers.contains(&vertex.table_identifier) {
                tracing::debug!(
                    identifier = %vertex.table_identifier,
                    version = vertex.version,
                    "identifier already resolved, skipping subtree"
                );
                continue;
            }

            // stack holds the root frame plus one frame per vertex on
            // the current chain, so the vertex about to be pushed would
            // sit at depth stack.len().
            if stack.len() > self.max_depth {
                return Err(ResolveError::DepthExceeded {
                    max_depth: self.max_depth,
                });
            }

            resolved_identifiers.insert(vertex.table_identifier.clone());
            resolved.push(ResolvedDependency::from(&vertex));

            let references = self.store.get_outgoing_edges(&vertex.key).await?;
            path_keys.insert(vertex.key.clone());
            stack.push(Frame {
                key: Some(vertex.key),
                identifier: vertex.table_identifier,
                references,
                next: 0,
            });
        }

        tracing::debug!(
            root = %root,
            count = resolved.len(),
            "dependency resolution complete"
        );
        Ok(resolved)
    }
}

/// Identifier chain from the first on-path occurrence of `closing`
/// down to the repeat, inclusive on both ends.
fn cycle_chain(stack: &[Frame], closing: &TableIdentifier) -> Vec<TableIdentifier> {
    let start = stack
        .iter()
        .position(|frame| frame.identifier == *closing)
        .unwrap_or(0);
    let mut chain: Vec<TableIdentifier> = stack[start..]
        .iter()
        .map(|frame| frame.identifier.clone())
        .collect();
    chain.push(closing.clone());
    chain
}
