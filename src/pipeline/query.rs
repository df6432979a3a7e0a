use bytes::Bytes;

use crate::error::PipelineError;
use crate::language::{self, LanguageCode};
use crate::llm::transcription;
use crate::models::{Modality, Query};
use crate::state::AppState;

/// Longest accepted question in bytes. Longer input is truncated at a char
/// boundary, not rejected.
pub const MAX_QUESTION_LEN: usize = 2000;

/// The two ways a question can arrive. `normalize` collapses both into a
/// `Query`, so nothing downstream can tell which arm it came from.
pub enum QueryInput {
    Text(String),
    Audio { bytes: Bytes, mime: String },
}

/// Turn raw input into a `Query`: transcribe (audio arm only), strip
/// prompt-control tokens, cap the length, and resolve the language.
///
/// A declared language always wins over detection. Anything that leaves no
/// usable text is an input error, raised before retrieval runs.
pub async fn normalize(
    state: &AppState,
    input: QueryInput,
    declared: Option<LanguageCode>,
) -> Result<Query, PipelineError> {
    let (raw, modality) = match input {
        QueryInput::Text(text) => (text, Modality::Text),
        QueryInput::Audio { bytes, mime } => {
            if bytes.is_empty() {
                return Err(PipelineError::Input("Audio payload is empty".to_string()));
            }
            if bytes.len() > state.config.max_audio_bytes {
                return Err(PipelineError::Input(format!(
                    "Audio payload exceeds the {} byte limit",
                    state.config.max_audio_bytes
                )));
            }
            let transcript =
                transcription::transcribe(&state.http_client, &state.config.stt, bytes, &mime, declared)
                    .await
                    .map_err(|e| PipelineError::Input(format!("Transcription failed: {e:#}")))?;
            (transcript, Modality::Audio)
        }
    };

    let normalized_text = clean_text(&raw);
    if normalized_text.is_empty() {
        return Err(PipelineError::Input(match modality {
            Modality::Text => "Message is required".to_string(),
            Modality::Audio => "Transcription produced no usable text".to_string(),
        }));
    }

    let detected_language = declared
        .unwrap_or_else(|| language::detect(&normalized_text, state.config.default_language));

    Ok(Query {
        raw_input: raw,
        modality,
        declared_language: declared,
        detected_language,
        normalized_text,
    })
}

/// Shared cleaning for both arms: trim, strip control tokens, cap length.
fn clean_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let capped = truncate_to_char_boundary(trimmed, MAX_QUESTION_LEN);
    sanitize_for_prompt(capped).trim().to_string()
}

/// Strip LLM control tokens from text that will be embedded in a prompt.
/// Retrieved document text gets the same treatment before it is quoted to
/// the model, so a document cannot smuggle in a role switch.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|im_start|>", "")
        .replace("<|im_end|>", "")
        .replace("<|endoftext|>", "")
}

/// Truncate a string to at most `max_bytes`, respecting UTF-8 char boundaries.
fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
