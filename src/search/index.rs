use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Similarity metric for k-NN search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Cosine,
    L2,
}

impl Metric {
    /// Parse the configured metric name; anything unrecognized means cosine.
    pub fn from_config(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "l2" | "euclidean" => Metric::L2,
            _ => Metric::Cosine,
        }
    }
}

/// An indexed chunk with its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub source: String,
    pub sequence_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Immutable snapshot of the embedded corpus.
///
/// An index is built in one shot and installed whole; it is never patched.
/// Searches run against whichever snapshot they grabbed, so a rebuild can
/// proceed while queries are in flight.
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    dim: usize,
    metric: Metric,
    document_count: usize,
    built_at: DateTime<Utc>,
}

/// Summary of the live index, reported by health and rebuild endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub embedding_dim: usize,
    pub built_at: DateTime<Utc>,
}

impl VectorIndex {
    /// The placeholder installed before the first successful build.
    pub fn empty(dim: usize, metric: Metric) -> Self {
        Self {
            entries: Vec::new(),
            dim,
            metric,
            document_count: 0,
            built_at: Utc::now(),
        }
    }

    /// Build from entries whose embeddings were produced together.
    pub fn from_parts(
        entries: Vec<IndexEntry>,
        dim: usize,
        metric: Metric,
        document_count: usize,
    ) -> Self {
        Self {
            entries,
            dim,
            metric,
            document_count,
            built_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            documents: self.document_count,
            chunks: self.entries.len(),
            embedding_dim: self.dim,
            built_at: self.built_at,
        }
    }

    /// Exact k-NN over every entry, highest relevance first.
    ///
    /// Relevance is cosine similarity for `Metric::Cosine` and `1/(1+d)` for
    /// `Metric::L2`, so higher is better under either metric and one cutoff
    /// works for both.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<(f32, &IndexEntry)> {
        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|e| (self.relevance(query_embedding, &e.embedding), e))
            .collect();

        // Sort descending by score
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    fn relevance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::L2 => {
                let d = l2_distance(a, b);
                if d.is_finite() {
                    1.0 / (1.0 + d)
                } else {
                    0.0
                }
            }
        }
    }
}

/// Handle to the live index.
///
/// Readers clone out an `Arc` snapshot; a finished rebuild replaces the
/// `Arc` under a brief write lock. A search therefore sees a complete old
/// index or a complete new one, never a mixture.
pub struct SharedIndex {
    inner: RwLock<Arc<VectorIndex>>,
}

impl SharedIndex {
    pub fn new(initial: VectorIndex) -> Self {
        Self {
            inner: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn snapshot(&self) -> Arc<VectorIndex> {
        self.inner.read().clone()
    }

    pub fn install(&self, index: VectorIndex) {
        *self.inner.write() = Arc::new(index);
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return f32::INFINITY;
    }

    let mut sum = 0.0f32;
    for i in 0..a.len() {
        let diff = a[i] - b[i];
        sum += diff * diff;
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            source: "doc.md".to_string(),
            sequence_index: 0,
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_search_orders_by_descending_relevance() {
        let index = VectorIndex::from_parts(
            vec![
                entry("far", vec![0.0, 1.0, 0.0]),
                entry("near", vec![1.0, 0.0, 0.0]),
                entry("middling", vec![0.7, 0.7, 0.0]),
            ],
            3,
            Metric::Cosine,
            1,
        );

        let hits = index.search(&[1.0, 0.0, 0.0], 3);
        assert_eq!(hits[0].1.text, "near");
        assert_eq!(hits[1].1.text, "middling");
        assert_eq!(hits[2].1.text, "far");
        assert!(hits[0].0 > hits[1].0 && hits[1].0 > hits[2].0);
    }

    #[test]
    fn test_search_truncates_to_k() {
        let entries = (0..10)
            .map(|i| entry(&format!("e{i}"), vec![i as f32, 1.0]))
            .collect();
        let index = VectorIndex::from_parts(entries, 2, Metric::Cosine, 1);
        assert_eq!(index.search(&[1.0, 0.0], 4).len(), 4);
        assert!(index.search(&[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        let index = VectorIndex::from_parts(
            vec![entry("short", vec![1.0, 0.0])],
            2,
            Metric::Cosine,
            1,
        );
        let hits = index.search(&[1.0, 0.0, 0.0], 1);
        assert_eq!(hits[0].0, 0.0);
    }

    #[test]
    fn test_l2_relevance_is_inverse_distance() {
        let index = VectorIndex::from_parts(
            vec![
                entry("same", vec![1.0, 1.0]),
                entry("off", vec![4.0, 5.0]),
            ],
            2,
            Metric::L2,
            1,
        );

        let hits = index.search(&[1.0, 1.0], 2);
        assert_eq!(hits[0].1.text, "same");
        assert_eq!(hits[0].0, 1.0); // distance 0 maps to relevance 1
        assert!(hits[1].0 > 0.0 && hits[1].0 < 1.0);
    }

    #[test]
    fn test_metric_from_config() {
        assert_eq!(Metric::from_config("cosine"), Metric::Cosine);
        assert_eq!(Metric::from_config("L2"), Metric::L2);
        assert_eq!(Metric::from_config("euclidean"), Metric::L2);
        assert_eq!(Metric::from_config("whatever"), Metric::Cosine);
    }

    #[test]
    fn test_install_leaves_existing_snapshots_intact() {
        let shared = SharedIndex::new(VectorIndex::from_parts(
            vec![entry("old", vec![1.0, 0.0])],
            2,
            Metric::Cosine,
            1,
        ));

        let before = shared.snapshot();
        shared.install(VectorIndex::from_parts(
            vec![
                entry("new a", vec![1.0, 0.0]),
                entry("new b", vec![0.0, 1.0]),
            ],
            2,
            Metric::Cosine,
            1,
        ));

        // The pre-swap snapshot still reads the complete old index.
        assert_eq!(before.len(), 1);
        assert_eq!(before.search(&[1.0, 0.0], 1)[0].1.text, "old");
        assert_eq!(shared.snapshot().len(), 2);
    }

    #[test]
    fn test_empty_index_reports_empty() {
        let index = VectorIndex::empty(768, Metric::Cosine);
        assert!(index.is_empty());
        assert!(index.search(&[0.0; 768], 5).is_empty());
        assert_eq!(index.stats().chunks, 0);
    }
}
