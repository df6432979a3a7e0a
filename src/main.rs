use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use doc_chat::api;
use doc_chat::config::Config;
use doc_chat::pipeline;
use doc_chat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Documents directory: {}", config.docs_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    tracing::info!(
        "Transcription: {}, speech: {}",
        config.stt.base_url.as_deref().unwrap_or("disabled"),
        config.tts.base_url.as_deref().unwrap_or("disabled"),
    );

    let state = AppState::new(config.clone())?;

    // Index up front. A cold start with the embedding backend down still
    // serves (answering with refusals) and can be re-indexed later.
    match pipeline::rebuild_index(&state).await {
        Ok(stats) => tracing::info!(
            "Startup index ready: {} chunk(s) from {} document(s)",
            stats.chunks,
            stats.documents
        ),
        Err(e) => tracing::warn!("Startup indexing failed, starting with an empty index: {e:#}"),
    }

    // Body limit sized for audio uploads plus multipart framing.
    let body_limit = config.max_audio_bytes + 64 * 1024;

    let app = Router::new()
        .route("/", get(api::admin::health))
        .route("/chat/text", post(api::chat::chat_text))
        .route("/chat/text/stream", post(api::chat::chat_text_stream))
        .route("/chat/audio", post(api::chat::chat_audio))
        .route("/tts", post(api::speech::speak))
        .route("/reindex", post(api::admin::reindex))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
