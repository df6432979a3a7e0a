pub mod answer;
pub mod query;

use anyhow::Context;
use bytes::Bytes;

use crate::error::PipelineError;
use crate::ingest;
use crate::language::LanguageCode;
use crate::llm::{embeddings, tts};
use crate::models::ChatTurn;
use crate::search::index::{IndexEntry, IndexStats, Metric, VectorIndex};
use crate::search::retriever;
use crate::state::AppState;

pub use answer::{AnswerEvent, AnswerStream};
pub use query::QueryInput;

/// Run a full text turn: normalize, retrieve, generate.
pub async fn process_text(
    state: &AppState,
    message: String,
    declared: Option<LanguageCode>,
) -> Result<ChatTurn, PipelineError> {
    run_turn(state, QueryInput::Text(message), declared).await
}

/// Run a full audio turn. Identical to a text turn after transcription.
pub async fn process_audio(
    state: &AppState,
    audio: Bytes,
    mime: String,
    declared: Option<LanguageCode>,
) -> Result<ChatTurn, PipelineError> {
    run_turn(state, QueryInput::Audio { bytes: audio, mime }, declared).await
}

/// Stages run strictly forward; the first failure aborts the turn with the
/// stage that raised it.
async fn run_turn(
    state: &AppState,
    input: QueryInput,
    declared: Option<LanguageCode>,
) -> Result<ChatTurn, PipelineError> {
    let query = query::normalize(state, input, declared).await?;
    let retrieval = retriever::retrieve(state, &query.normalized_text)
        .await
        .map_err(PipelineError::Retrieval)?;
    let answer = answer::generate(state, &query, &retrieval).await?;
    let language = query.detected_language;
    Ok(ChatTurn {
        query,
        retrieval,
        answer,
        language,
    })
}

/// Normalize and retrieve eagerly, then hand back the answer stream.
///
/// Errors up to and including opening the model stream surface as `Err`, so
/// the caller can still send a plain HTTP error. After that, failures ride
/// inside the stream as events.
pub async fn open_stream(
    state: &AppState,
    input: QueryInput,
    declared: Option<LanguageCode>,
) -> Result<(LanguageCode, AnswerStream), PipelineError> {
    let query = query::normalize(state, input, declared).await?;
    let retrieval = retriever::retrieve(state, &query.normalized_text)
        .await
        .map_err(PipelineError::Retrieval)?;
    let language = query.detected_language;
    let stream = answer::generate_stream(state, &query, &retrieval).await?;
    Ok((language, stream))
}

/// Synthesize spoken audio for a piece of answer text, serving repeats from
/// the cache. Concurrent requests for the same (text, language) share one
/// backend call.
pub async fn speak(
    state: &AppState,
    text: &str,
    language: LanguageCode,
) -> Result<Bytes, PipelineError> {
    let client = state.http_client.clone();
    let config = state.config.tts.clone();
    let input = text.to_string();
    state
        .tts_cache
        .get_or_synthesize(text, language, move || async move {
            tts::synthesize(&client, &config, &input, language).await
        })
        .await
        .map_err(PipelineError::Synthesis)
}

/// Rebuild the vector index from the documents directory and swap it in.
///
/// The running index keeps serving queries until `install`; a failed rebuild
/// leaves it untouched.
pub async fn rebuild_index(state: &AppState) -> Result<IndexStats, PipelineError> {
    build_and_install(state).await.map_err(PipelineError::IndexBuild)
}

async fn build_and_install(state: &AppState) -> anyhow::Result<IndexStats> {
    let config = &state.config;
    let documents = ingest::load_documents(&config.docs_dir, config.max_document_bytes)?;

    let mut chunks = Vec::new();
    let mut texts = Vec::new();
    for document in &documents {
        for chunk in ingest::chunk_document(document, config.chunk_chars, config.chunk_overlap_chars)
        {
            texts.push(chunk.text.clone());
            chunks.push((chunk, document.source_path.clone()));
        }
    }
    tracing::info!(
        "Indexing {} chunk(s) from {} document(s) in {}",
        chunks.len(),
        documents.len(),
        config.docs_dir.display()
    );

    let embeddings = embeddings::embed_batch(&state.http_client, &config.llm, &texts)
        .await
        .context("Chunk embedding failed")?;
    if embeddings.len() != chunks.len() {
        anyhow::bail!(
            "Embedding backend returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        );
    }

    let entries: Vec<IndexEntry> = chunks
        .into_iter()
        .zip(embeddings)
        .map(|((chunk, source), embedding)| IndexEntry {
            chunk_id: chunk.id,
            document_id: chunk.document_id,
            source,
            sequence_index: chunk.sequence_index,
            text: chunk.text,
            embedding,
        })
        .collect();

    let index = VectorIndex::from_parts(
        entries,
        config.llm.embedding_dim,
        Metric::from_config(&config.metric),
        documents.len(),
    );
    let stats = index.stats();
    state.index.install(index);

    tracing::info!(
        "Index rebuilt: {} chunk(s) from {} document(s)",
        stats.chunks,
        stats.documents
    );
    Ok(stats)
}
