use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::search::index::{Metric, SharedIndex, VectorIndex};
use crate::tts_cache::TtsCache;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub index: Arc<SharedIndex>,
    pub tts_cache: Arc<TtsCache>,
    pub http_client: reqwest::Client,
    pub chat_semaphore: Arc<tokio::sync::Semaphore>,
    /// Set while a rebuild task is running; a second rebuild is refused.
    pub rebuild_running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let metric = Metric::from_config(&config.metric);
        let index = SharedIndex::new(VectorIndex::empty(config.llm.embedding_dim, metric));

        let max_age = match config.tts_cache_max_age_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let tts_cache = TtsCache::new(config.tts_cache_capacity, max_age);

        let max_concurrent_chats = config.max_concurrent_chats;

        Ok(Self {
            config,
            index: Arc::new(index),
            tts_cache: Arc::new(tts_cache),
            http_client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(120))
                .build()?,
            chat_semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrent_chats)),
            rebuild_running: Arc::new(AtomicBool::new(false)),
        })
    }
}
