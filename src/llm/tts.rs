//! Text-to-speech via an OpenAI-compatible `/v1/audio/speech` endpoint.
//!
//! The `language` field rides along for multilingual backends; endpoints
//! that voice purely from the input text ignore it.

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;

use crate::config::TtsConfig;
use crate::language::LanguageCode;

#[derive(Serialize)]
struct SpeechRequest {
    model: String,
    input: String,
    voice: String,
    response_format: String,
    language: String,
}

/// Synthesize `text` and return the raw audio bytes.
pub async fn synthesize(
    client: &reqwest::Client,
    config: &TtsConfig,
    text: &str,
    language: LanguageCode,
) -> Result<Bytes> {
    let base_url = config
        .base_url
        .as_deref()
        .context("TTS base_url not configured")?;

    let url = format!("{}/v1/audio/speech", base_url.trim_end_matches('/'));

    let req_body = SpeechRequest {
        model: config.model.clone(),
        input: text.to_string(),
        voice: config.voice.clone(),
        response_format: config.format.clone(),
        language: language.tag().to_string(),
    };

    let timeout = std::time::Duration::from_secs(config.timeout_secs);

    let mut req = client.post(&url).timeout(timeout).json(&req_body);
    if let Some(key) = config.api_key.as_deref() {
        req = req.header("Authorization", format!("Bearer {key}"));
    }

    let resp = req.send().await.context("Failed to reach TTS endpoint")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("TTS API returned {status}: {body}");
    }

    let audio = resp.bytes().await.context("Failed to read TTS audio body")?;
    if audio.is_empty() {
        anyhow::bail!("TTS API returned an empty audio body");
    }

    Ok(audio)
}
