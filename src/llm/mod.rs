pub mod embeddings;
pub mod generation;
pub mod transcription;
pub mod tts;
