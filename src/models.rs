use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::language::LanguageCode;

/// An ingested source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub source_path: String,
    pub raw_text: String,
    pub ingested_at: DateTime<Utc>,
}

/// A chunk cut from one document, the unit of indexing and retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub sequence_index: usize,
    pub text: String,
    /// Char offsets into the parent document's raw text
    pub char_span: (usize, usize),
}

/// Input modality of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    Text,
    Audio,
}

/// A normalized query; the one shape every downstream stage consumes,
/// whichever arm produced it
#[derive(Debug, Clone)]
pub struct Query {
    pub raw_input: String,
    pub modality: Modality,
    pub declared_language: Option<LanguageCode>,
    pub detected_language: LanguageCode,
    pub normalized_text: String,
}

/// A retrieved chunk with its relevance score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub source: String,
    pub sequence_index: usize,
    pub text: String,
    pub score: f32,
}

/// Ordered retrieval output. Empty is a valid outcome, not an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// A completed turn, returned to the caller and never stored
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub query: Query,
    pub retrieval: RetrievalResult,
    pub answer: String,
    pub language: LanguageCode,
}

/// A single prompt message (system or user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}


/// Text chat request
#[derive(Debug, Clone, Deserialize)]
pub struct TextChatRequest {
    pub message: String,
    /// Declared language; overrides detection when present
    #[serde(default)]
    pub language: Option<LanguageCode>,
}

/// Text chat response
#[derive(Debug, Clone, Serialize)]
pub struct TextChatResponse {
    pub answer: String,
    pub language: LanguageCode,
    pub query: String,
}

/// Audio chat response
#[derive(Debug, Clone, Serialize)]
pub struct AudioChatResponse {
    pub transcription: String,
    pub answer: String,
    pub language: LanguageCode,
}

/// Speech synthesis request
#[derive(Debug, Clone, Deserialize)]
pub struct SpeakRequest {
    pub text: String,
    #[serde(default)]
    pub language: Option<LanguageCode>,
}

/// Speech synthesis response; `available: false` means no TTS backend is configured
#[derive(Debug, Clone, Serialize)]
pub struct SpeakResponse {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
}
