use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::pipeline;
use crate::state::AppState;

/// GET / — service health, index freshness, and a route map.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let stats = state.index.snapshot().stats();
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "index": stats,
        "tts_available": state.config.tts.base_url.is_some(),
        "languages": ["en", "hi", "ta", "te"],
        "endpoints": {
            "text_chat": "POST /chat/text",
            "text_chat_stream": "POST /chat/text/stream",
            "audio_chat": "POST /chat/audio",
            "speech": "POST /tts",
            "reindex": "POST /reindex",
        },
    }))
}

/// POST /reindex — rebuild the document index in the background.
///
/// Only one rebuild runs at a time; a request while one is in flight gets
/// 409. Queries keep hitting the old index until the new one is installed.
pub async fn reindex(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, Json<serde_json::Value>)> {
    if state
        .rebuild_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": "A rebuild is already running" })),
        ));
    }

    let state_clone = state.clone();
    tokio::spawn(async move {
        match pipeline::rebuild_index(&state_clone).await {
            Ok(stats) => tracing::info!(
                "Background rebuild finished: {} chunk(s) from {} document(s)",
                stats.chunks,
                stats.documents
            ),
            Err(e) => tracing::error!("Background rebuild failed: {e:#}"),
        }
        state_clone.rebuild_running.store(false, Ordering::SeqCst);
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "rebuilding" })),
    ))
}
