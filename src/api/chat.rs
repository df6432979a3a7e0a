use std::convert::Infallible;

use axum::extract::{Multipart, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::OwnedSemaphorePermit;

use crate::error::PipelineError;
use crate::language::LanguageCode;
use crate::models::{AudioChatResponse, ChatTurn, TextChatRequest, TextChatResponse};
use crate::pipeline::{self, AnswerEvent, QueryInput};
use crate::state::AppState;

/// POST /chat/text — answer one question in a single JSON response.
pub async fn chat_text(
    State(state): State<AppState>,
    Json(req): Json<TextChatRequest>,
) -> Result<Json<TextChatResponse>, PipelineError> {
    let _permit = acquire_chat_permit(&state).await?;

    let turn = pipeline::process_text(&state, req.message, req.language).await?;
    Ok(Json(TextChatResponse {
        answer: turn.answer,
        language: turn.language,
        query: turn.query.normalized_text,
    }))
}

/// POST /chat/text/stream — the same turn over SSE.
///
/// Event order: one `language`, then `content` fragments, at most one
/// `error`, and exactly one `done` closing every stream.
pub async fn chat_text_stream(
    State(state): State<AppState>,
    Json(req): Json<TextChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, PipelineError> {
    let _permit = acquire_chat_permit(&state).await?;

    let (language, answer_stream) =
        pipeline::open_stream(&state, QueryInput::Text(req.message), req.language).await?;

    let language_event: Result<Event, Infallible> = Ok(Event::default()
        .event("language")
        .json_data(serde_json::json!({ "language": language }))
        .unwrap());

    let event_stream = stream::once(async move { language_event })
        .chain(answer_stream.map(answer_event_to_sse));

    // Hold the semaphore permit for the lifetime of the stream
    let event_stream = event_stream.map(move |event| {
        let _permit = &_permit;
        event
    });

    Ok(Sse::new(event_stream))
}

/// POST /chat/audio — multipart audio turn: transcribe, then answer.
///
/// Fields: `file` (the recording, required) and `language` (optional tag).
pub async fn chat_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AudioChatResponse>, PipelineError> {
    let mut audio: Option<(Bytes, String)> = None;
    let mut declared: Option<LanguageCode> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                audio = Some((bytes, mime));
            }
            "language" => {
                let tag = field.text().await.map_err(bad_multipart)?;
                declared = parse_language_tag(&tag)?;
            }
            _ => {}
        }
    }

    let (bytes, mime) = audio
        .ok_or_else(|| PipelineError::Input("Multipart field 'file' is required".to_string()))?;

    let _permit = acquire_chat_permit(&state).await?;

    let ChatTurn {
        query,
        answer,
        language,
        ..
    } = pipeline::process_audio(&state, bytes, mime, declared).await?;

    Ok(Json(AudioChatResponse {
        transcription: query.raw_input,
        answer,
        language,
    }))
}

// ─── Helper functions ────────────────────────────────────

async fn acquire_chat_permit(state: &AppState) -> Result<OwnedSemaphorePermit, PipelineError> {
    state
        .chat_semaphore
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| PipelineError::Generation(anyhow::anyhow!("Chat service is shutting down")))
}

/// Parse a declared language field from a form value. A blank field counts
/// as absent; an unknown tag is an input error, not a silent default.
pub(crate) fn parse_language_tag(tag: &str) -> Result<Option<LanguageCode>, PipelineError> {
    let tag = tag.trim();
    if tag.is_empty() {
        return Ok(None);
    }
    LanguageCode::parse(tag)
        .map(Some)
        .ok_or_else(|| PipelineError::Input(format!("Unsupported language tag: {tag}")))
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> PipelineError {
    PipelineError::Input(format!("Malformed multipart request: {e}"))
}

fn answer_event_to_sse(event: AnswerEvent) -> Result<Event, Infallible> {
    let event = match event {
        AnswerEvent::Content(content) => Event::default()
            .event("content")
            .json_data(serde_json::json!({ "content": content }))
            .unwrap(),
        AnswerEvent::Error(message) => Event::default()
            .event("error")
            .json_data(serde_json::json!({ "message": message }))
            .unwrap(),
        AnswerEvent::Done => Event::default()
            .event("done")
            .json_data(serde_json::json!({}))
            .unwrap(),
    };
    Ok(event)
}
