//! Speech-to-text via an OpenAI-compatible `/v1/audio/transcriptions`
//! endpoint (Whisper-style servers, Groq, OpenAI itself).

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Deserialize;

use crate::config::SttConfig;
use crate::language::LanguageCode;

/// Transcribe an audio payload.
///
/// `language_hint` narrows the decoder when the caller declared a language;
/// without it the backend auto-detects.
pub async fn transcribe(
    client: &reqwest::Client,
    config: &SttConfig,
    audio: Bytes,
    mime: &str,
    language_hint: Option<LanguageCode>,
) -> Result<String> {
    let base_url = config
        .base_url
        .as_deref()
        .context("Transcription base_url not configured")?;

    let url = format!("{}/v1/audio/transcriptions", base_url.trim_end_matches('/'));

    let part = reqwest::multipart::Part::bytes(audio.to_vec())
        .file_name(file_name_for_mime(mime))
        .mime_str(mime)
        .context("Invalid audio content type")?;

    let mut form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("model", config.model.clone())
        .text("response_format", "json");

    if let Some(lang) = language_hint {
        form = form.text("language", lang.tag());
    }

    let timeout = std::time::Duration::from_secs(config.timeout_secs);

    let mut req = client.post(&url).timeout(timeout).multipart(form);
    if let Some(key) = config.api_key.as_deref() {
        req = req.header("Authorization", format!("Bearer {key}"));
    }

    let resp = req
        .send()
        .await
        .context("Failed to reach transcription endpoint")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Transcription API returned {status}: {body}");
    }

    let body: TranscriptionResponse = resp
        .json()
        .await
        .context("Failed to parse transcription response")?;

    Ok(body.text)
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper servers sniff the container from the uploaded file name, so give
/// the part an extension matching its content type.
fn file_name_for_mime(mime: &str) -> &'static str {
    match mime.split(';').next().unwrap_or_default().trim() {
        "audio/mpeg" | "audio/mp3" => "audio.mp3",
        "audio/webm" | "video/webm" => "audio.webm",
        "audio/ogg" => "audio.ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "audio.m4a",
        "audio/flac" | "audio/x-flac" => "audio.flac",
        _ => "audio.wav",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_follows_content_type() {
        assert_eq!(file_name_for_mime("audio/mpeg"), "audio.mp3");
        assert_eq!(file_name_for_mime("audio/webm"), "audio.webm");
        assert_eq!(file_name_for_mime("audio/wav"), "audio.wav");
    }

    #[test]
    fn test_file_name_ignores_mime_parameters() {
        assert_eq!(file_name_for_mime("audio/ogg; codecs=opus"), "audio.ogg");
    }

    #[test]
    fn test_unknown_mime_defaults_to_wav() {
        assert_eq!(file_name_for_mime("application/octet-stream"), "audio.wav");
        assert_eq!(file_name_for_mime(""), "audio.wav");
    }
}
