//! Candidate lookup for dependency pickers.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::TableIdentifier;

/// Error surfaced by candidate lookups.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The index backing the search failed.
    #[error("candidate index error: {0}")]
    Index(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl SearchError {
    /// Wrap an index-specific error.
    pub fn index<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Index(Box::new(error))
    }
}

/// Text index over published table identifiers.
///
/// Matching is case-insensitive substring containment over the
/// canonical `@username/slug` form, and an empty query matches
/// everything. Result order must be deterministic for a given graph
/// state.
#[async_trait]
pub trait CandidateIndex: Send + Sync {
    /// Identifiers whose canonical form matches `query`.
    async fn search(&self, query: &str) -> Result<Vec<TableIdentifier>, SearchError>;
}

/// Dependency candidate search over an index.
///
/// Thin adapter that removes the table being edited from its own
/// candidate list, so a table can never pick itself as a dependency.
pub struct CandidateSearch<I: CandidateIndex> {
    index: Arc<I>,
}

impl<I: CandidateIndex> CandidateSearch<I> {
    /// Create a search over an index.
    pub fn new(index: Arc<I>) -> Self {
        Self { index }
    }

    /// Find dependency candidates for the table `exclude` is editing.
    ///
    /// Returns the index's matches for `query` minus `exclude` itself,
    /// preserving the index's order. An `exclude` that matches nothing
    /// simply filters nothing; it does not have to be published.
    pub async fn find_candidates(
        &self,
        query: &str,
        exclude: &TableIdentifier,
    ) -> Result<Vec<TableIdentifier>, SearchError> {
        let mut candidates = self.index.search(query).await?;
        candidates.retain(|candidate| candidate != exclude);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryGraphStore, TableGraphStore};

    fn ident(raw: &str) -> TableIdentifier {
        TableIdentifier::parse(raw).unwrap()
    }

    async fn seeded_store() -> Arc<InMemoryGraphStore> {
        let store = InMemoryGraphStore::new();
        for raw in ["@alice/beasts", "@bob/beasts", "@bob/potions"] {
            store.upsert_vertex(&ident(raw), 1, "x").await.unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_excludes_the_editing_table() {
        let search = CandidateSearch::new(seeded_store().await);
        let hits = search
            .find_candidates("beasts", &ident("@bob/beasts"))
            .await
            .unwrap();
        assert_eq!(hits, vec![ident("@alice/beasts")]);
    }

    #[tokio::test]
    async fn test_unpublished_exclude_filters_nothing() {
        let search = CandidateSearch::new(seeded_store().await);
        let hits = search
            .find_candidates("beasts", &ident("@nobody/new-table"))
            .await
            .unwrap();
        assert_eq!(hits, vec![ident("@alice/beasts"), ident("@bob/beasts")]);
    }

    #[tokio::test]
    async fn test_empty_query_returns_everything_but_self() {
        let search = CandidateSearch::new(seeded_store().await);
        let hits = search
            .find_candidates("", &ident("@bob/potions"))
            .await
            .unwrap();
        assert_eq!(hits, vec![ident("@alice/beasts"), ident("@bob/beasts")]);
    }

    #[tokio::test]
    async fn test_no_matches_yield_empty_list() {
        let search = CandidateSearch::new(seeded_store().await);
        let hits = search
            .find_candidates("dragons", &ident("@bob/beasts"))
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
