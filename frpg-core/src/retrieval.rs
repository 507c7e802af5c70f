//! Retrieval store for compacted transcript fragments.
//!
//! The store is an external collaborator behind a trait: fragments go in
//! tagged with their round, and the top-k most similar come back for
//! prompt assembly. A lexical in-memory implementation ships with the
//! crate so the pipeline runs self-contained; an embedding-backed store
//! can be swapped in without touching the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chunk of folded transcript, tagged with the round it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    pub round: usize,
}

impl Fragment {
    pub fn new(text: impl Into<String>, round: usize) -> Self {
        Self {
            text: text.into(),
            round,
        }
    }
}

/// Similarity-search index over transcript fragments.
///
/// Append-only for the lifetime of a session: fragments are never deleted
/// once indexed.
#[async_trait]
pub trait RetrievalStore: Send + Sync {
    /// Add a fragment to the index.
    async fn index(&mut self, fragment: Fragment);

    /// Return the top-k fragments most similar to `text`, best first.
    /// Ties keep the store's native (insertion) order.
    async fn query(&self, text: &str, k: usize) -> Vec<Fragment>;

    /// Number of indexed fragments.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory lexical store scoring by word overlap.
#[derive(Debug, Default)]
pub struct LexicalStore {
    fragments: Vec<Fragment>,
}

impl LexicalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(str::to_string)
            .collect()
    }

    fn score(query_tokens: &[String], fragment: &Fragment) -> usize {
        let fragment_tokens = Self::tokenize(&fragment.text);
        query_tokens
            .iter()
            .filter(|t| fragment_tokens.contains(t))
            .count()
    }
}

#[async_trait]
impl RetrievalStore for LexicalStore {
    async fn index(&mut self, fragment: Fragment) {
        self.fragments.push(fragment);
    }

    async fn query(&self, text: &str, k: usize) -> Vec<Fragment> {
        let query_tokens = Self::tokenize(text);

        let mut scored: Vec<(usize, &Fragment)> = self
            .fragments
            .iter()
            .map(|f| (Self::score(&query_tokens, f), f))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored.into_iter().take(k).map(|(_, f)| f.clone()).collect()
    }

    fn len(&self) -> usize {
        self.fragments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_index_and_query() {
        let mut store = LexicalStore::new();
        store
            .index(Fragment::new("Player: I buy a pistol from the fixer", 1))
            .await;
        store
            .index(Fragment::new("GM: The rain hammers the neon streets", 1))
            .await;
        store
            .index(Fragment::new("Player: I ask the fixer about the pistol", 2))
            .await;

        let results = store.query("where did I get my pistol", 2).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].text.contains("pistol"));
        assert!(results[1].text.contains("pistol"));
    }

    #[tokio::test]
    async fn test_query_with_no_match() {
        let mut store = LexicalStore::new();
        store.index(Fragment::new("GM: The bar is quiet", 1)).await;

        let results = store.query("zzz qqq", 3).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let mut store = LexicalStore::new();
        store.index(Fragment::new("the fixer waits", 1)).await;
        store.index(Fragment::new("the fixer leaves", 2)).await;

        let results = store.query("fixer", 2).await;
        assert_eq!(results[0].round, 1);
        assert_eq!(results[1].round, 2);
    }

    #[tokio::test]
    async fn test_store_only_grows() {
        let mut store = LexicalStore::new();
        assert!(store.is_empty());
        store.index(Fragment::new("a line of play", 1)).await;
        store.index(Fragment::new("another line", 2)).await;
        assert_eq!(store.len(), 2);
    }
}
