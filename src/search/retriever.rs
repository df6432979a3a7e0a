use anyhow::{Context, Result};

use crate::llm::embeddings;
use crate::models::{RetrievalResult, ScoredChunk};
use crate::search::index::IndexEntry;
use crate::state::AppState;

/// Retrieve the chunks most relevant to an already-normalized query.
///
/// An empty index short-circuits to an empty result without an embedding
/// call, so an unindexed service still answers turns (with the refusal).
/// An empty result is a valid outcome; only an embedding failure is an
/// error.
pub async fn retrieve(state: &AppState, normalized_text: &str) -> Result<RetrievalResult> {
    let snapshot = state.index.snapshot();
    if snapshot.is_empty() {
        tracing::debug!("Index is empty, skipping retrieval");
        return Ok(RetrievalResult::default());
    }

    let query_embedding =
        embeddings::embed_single(&state.http_client, &state.config.llm, normalized_text)
            .await
            .context("Query embedding failed")?;

    let scored = snapshot.search(&query_embedding, state.config.top_k);
    let hits = apply_cutoff(scored, state.config.min_score);

    tracing::debug!(
        "Retrieved {} chunk(s) above score {}",
        hits.len(),
        state.config.min_score
    );

    Ok(RetrievalResult { hits })
}

/// Drop hits scoring below the cutoff, even inside the top k.
fn apply_cutoff(scored: Vec<(f32, &IndexEntry)>, min_score: f32) -> Vec<ScoredChunk> {
    scored
        .into_iter()
        .filter(|(score, _)| *score >= min_score)
        .map(|(score, entry)| ScoredChunk {
            chunk_id: entry.chunk_id,
            document_id: entry.document_id,
            source: entry.source.clone(),
            sequence_index: entry.sequence_index,
            text: entry.text.clone(),
            score,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use uuid::Uuid;

    fn entry(text: &str) -> IndexEntry {
        IndexEntry {
            chunk_id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            source: "doc.md".to_string(),
            sequence_index: 0,
            text: text.to_string(),
            embedding: vec![1.0, 0.0],
        }
    }

    #[test]
    fn test_cutoff_drops_low_scores_inside_top_k() {
        let a = entry("relevant");
        let b = entry("marginal");
        let c = entry("noise");
        let scored = vec![(0.9, &a), (0.3, &b), (0.1, &c)];

        let hits = apply_cutoff(scored, 0.3);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "relevant");
        // A hit exactly at the cutoff survives.
        assert_eq!(hits[1].text, "marginal");
    }

    #[test]
    fn test_cutoff_can_empty_the_result() {
        let a = entry("noise");
        let hits = apply_cutoff(vec![(0.05, &a)], 0.5);
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_short_circuits_without_embedding_call() {
        // Default config points at a local backend that isn't running; the
        // empty-index path must not try to reach it.
        let state = crate::state::AppState::new(Config::default()).unwrap();
        let result = retrieve(&state, "anything at all").await.unwrap();
        assert!(result.is_empty());
    }
}
