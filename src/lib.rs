//! # doc-chat
//!
//! A Rust web service that answers questions about a directory of internal
//! documents, with retrieval-grounded generation, four answer languages
//! (English, Hindi, Tamil, Telugu), voice input, and cached speech output.
//!
//! ## Architecture
//!
//! Every turn runs the same forward-only pipeline, whichever door it
//! came in through:
//!
//! ```text
//!     Text question            Audio question
//!          │                        │
//!          │                 ┌──────▼───────┐
//!          │                 │  Transcribe  │
//!          │                 └──────┬───────┘
//!          └───────────┬────────────┘
//!                      ▼
//!              ┌───────────────┐
//!              │   Normalize   │  trim, strip control tokens,
//!              │               │  resolve language (en/hi/ta/te)
//!              └───────┬───────┘
//!                      ▼
//!              ┌───────────────┐
//!              │   Retrieve    │  embed query, top-k over the
//!              │               │  in-memory index, score cutoff
//!              └───────┬───────┘
//!                      ▼
//!              ┌───────────────┐
//!              │   Generate    │  answer from excerpts only, or
//!              │               │  the localized refusal string
//!              └───────┬───────┘
//!                      ▼
//!              ┌───────────────┐
//!              │  Synthesize   │  on-demand TTS, cached per
//!              │  (on demand)  │  (text, language)
//!              └───────────────┘
//! ```
//!
//! Retrieval never targets a half-built index: rebuilds assemble a fresh
//! index off to the side and swap it in atomically.
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, documents dir, and backends
//! - [`models`] - Shared data types: `Document`, `Chunk`, `Query`, request/response types
//! - [`language`] - Supported language codes, script-based detection, refusal strings
//! - [`ingest`] - Document loading and overlapping boundary-snapped chunking
//! - [`search::index`] - In-memory vector index with cosine/L2 scoring and atomic swap
//! - [`search::retriever`] - Query embedding, top-k search, relevance cutoff
//! - [`llm`] - Backend clients: embeddings, chat completion, transcription, speech
//! - [`pipeline`] - The turn orchestrator: normalize, retrieve, generate, speak
//! - [`tts_cache`] - Single-flight cache for synthesized audio
//! - [`api`] - Axum HTTP handlers for chat, speech, health, and re-indexing
//! - [`error`] - The stage-tagged failure taxonomy
//! - [`state`] - Shared application state

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod language;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
pub mod tts_cache;
