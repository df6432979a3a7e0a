use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::language::LanguageCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned for source documents
    pub docs_dir: PathBuf,
    /// Server bind address
    pub bind_addr: String,
    /// Chat + embedding provider configuration
    pub llm: LlmConfig,
    /// Speech-to-text sidecar configuration
    pub stt: SttConfig,
    /// Text-to-speech sidecar configuration
    pub tts: TtsConfig,
    /// Language assumed when detection has too little signal
    pub default_language: LanguageCode,
    /// Chunk window size in characters
    pub chunk_chars: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap_chars: usize,
    /// Number of chunks retrieved per query
    pub top_k: usize,
    /// Relevance cutoff; hits scoring below this are dropped
    pub min_score: f32,
    /// Similarity metric: "cosine" or "l2"
    pub metric: String,
    /// Maximum size of a single document file in bytes
    pub max_document_bytes: u64,
    /// Maximum uploaded audio size in bytes
    pub max_audio_bytes: usize,
    /// Maximum concurrent generation calls
    pub max_concurrent_chats: usize,
    /// Synthesized-audio cache capacity in entries (0 = unbounded)
    pub tts_cache_capacity: usize,
    /// Synthesized-audio max age in seconds (0 = no age eviction)
    pub tts_cache_max_age_secs: u64,
}

/// Configuration for the speech-to-text sidecar (any Whisper-style endpoint
/// speaking the OpenAI transcription API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// Base URL for the transcription API (e.g. "https://api.groq.com/openai").
    /// If None, audio turns are rejected.
    pub base_url: Option<String>,
    /// Model name to send in the transcription request.
    pub model: String,
    /// API key, if the endpoint wants one.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "whisper-large-v3".to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Configuration for the text-to-speech sidecar (OpenAI speech API shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Base URL for the speech API. If None, synthesis is reported as
    /// unavailable rather than failing.
    pub base_url: Option<String>,
    /// Model name to send in the speech request.
    pub model: String,
    /// Voice name to send in the speech request.
    pub voice: String,
    /// Audio container requested from the backend.
    pub format: String,
    /// API key, if the endpoint wants one.
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            format: "mp3".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model name for chat
    pub chat_model: String,
    /// Model name for embeddings
    pub embedding_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Embedding vector dimension
    pub embedding_dim: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from("./docs"),
            bind_addr: "127.0.0.1:8000".to_string(),
            llm: LlmConfig::default(),
            stt: SttConfig::default(),
            tts: TtsConfig::default(),
            default_language: LanguageCode::En,
            chunk_chars: 1000,
            chunk_overlap_chars: 200,
            top_k: 5,
            min_score: 0.3,
            metric: "cosine".to_string(),
            max_document_bytes: 5 * 1024 * 1024,
            max_audio_bytes: 10 * 1024 * 1024,
            max_concurrent_chats: 4,
            tts_cache_capacity: 64,
            tts_cache_max_age_secs: 24 * 3600,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            api_key: None,
            embedding_dim: 768,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DOC_CHAT_DOCS_DIR") {
            config.docs_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("DOC_CHAT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Ok(model) = std::env::var("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Ok(model) = std::env::var("LLM_EMBEDDING_MODEL") {
            config.llm.embedding_model = model;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("LLM_EMBEDDING_DIM") {
            if let Ok(d) = dim.parse() {
                config.llm.embedding_dim = d;
            }
        }
        if let Ok(tag) = std::env::var("DOC_CHAT_DEFAULT_LANGUAGE") {
            if let Some(lang) = LanguageCode::parse(&tag) {
                config.default_language = lang;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_CHUNK_CHARS") {
            if let Ok(v) = val.parse() {
                config.chunk_chars = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_CHUNK_OVERLAP_CHARS") {
            if let Ok(v) = val.parse() {
                config.chunk_overlap_chars = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_TOP_K") {
            if let Ok(v) = val.parse() {
                config.top_k = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_MIN_SCORE") {
            if let Ok(v) = val.parse() {
                config.min_score = v;
            }
        }
        if let Ok(metric) = std::env::var("DOC_CHAT_METRIC") {
            config.metric = metric;
        }
        if let Ok(val) = std::env::var("DOC_CHAT_MAX_DOCUMENT_BYTES") {
            if let Ok(v) = val.parse() {
                config.max_document_bytes = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_MAX_AUDIO_BYTES") {
            if let Ok(v) = val.parse() {
                config.max_audio_bytes = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_MAX_CONCURRENT_CHATS") {
            if let Ok(v) = val.parse() {
                config.max_concurrent_chats = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_TTS_CACHE_CAPACITY") {
            if let Ok(v) = val.parse() {
                config.tts_cache_capacity = v;
            }
        }
        if let Ok(val) = std::env::var("DOC_CHAT_TTS_CACHE_MAX_AGE_SECS") {
            if let Ok(v) = val.parse() {
                config.tts_cache_max_age_secs = v;
            }
        }

        // STT sidecar
        if let Ok(url) = std::env::var("STT_BASE_URL") {
            config.stt.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("STT_MODEL") {
            config.stt.model = model;
        }
        if let Ok(key) = std::env::var("STT_API_KEY") {
            config.stt.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("STT_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.stt.timeout_secs = v;
            }
        }

        // TTS sidecar
        if let Ok(url) = std::env::var("TTS_BASE_URL") {
            config.tts.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("TTS_MODEL") {
            config.tts.model = model;
        }
        if let Ok(voice) = std::env::var("TTS_VOICE") {
            config.tts.voice = voice;
        }
        if let Ok(format) = std::env::var("TTS_FORMAT") {
            config.tts.format = format;
        }
        if let Ok(key) = std::env::var("TTS_API_KEY") {
            config.tts.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("TTS_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                config.tts.timeout_secs = v;
            }
        }

        config
    }
}
