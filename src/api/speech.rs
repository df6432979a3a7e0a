use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::PipelineError;
use crate::models::{SpeakRequest, SpeakResponse};
use crate::pipeline;
use crate::state::AppState;

/// POST /tts — synthesize spoken audio for a piece of text.
///
/// With no synthesis backend configured this still returns 200 with
/// `available: false`, so clients can probe capability without an error
/// path. Repeat requests for the same (text, language) are served from the
/// cache.
pub async fn speak(
    State(state): State<AppState>,
    Json(req): Json<SpeakRequest>,
) -> Result<Json<SpeakResponse>, PipelineError> {
    let text = req.text.trim().to_string();
    if text.is_empty() {
        return Err(PipelineError::Input("Text is required".to_string()));
    }
    let language = req.language.unwrap_or(state.config.default_language);

    if state.config.tts.base_url.is_none() {
        return Ok(Json(SpeakResponse {
            available: false,
            format: None,
            audio_base64: None,
        }));
    }

    let audio = pipeline::speak(&state, &text, language).await?;
    Ok(Json(SpeakResponse {
        available: true,
        format: Some(state.config.tts.format.clone()),
        audio_base64: Some(BASE64.encode(&audio)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Stage;

    #[tokio::test]
    async fn test_empty_text_is_input_error() {
        let state = AppState::new(Config::default()).unwrap();
        let err = speak(State(state), Json(SpeakRequest { text: "  ".to_string(), language: None }))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Normalize);
    }

    #[tokio::test]
    async fn test_unconfigured_backend_reports_unavailable() {
        // Default config has no TTS base_url.
        let state = AppState::new(Config::default()).unwrap();
        let resp = speak(
            State(state),
            Json(SpeakRequest { text: "नमस्ते".to_string(), language: None }),
        )
        .await
        .unwrap();
        assert!(!resp.available);
        assert!(resp.format.is_none());
        assert!(resp.audio_base64.is_none());
    }
}
