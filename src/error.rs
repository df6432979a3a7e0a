use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Pipeline stations, in execution order. Every error carries the stage
/// that raised it so callers can tell where a turn died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Retrieve,
    Generate,
    Synthesize,
    IndexBuild,
}

/// Failure taxonomy for the question-answering pipeline.
///
/// "Nothing relevant was found" is not in here: that is a successful turn
/// answered with the localized refusal string. These variants all mean the
/// turn did not complete.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Unusable input: empty message, empty or undecodable audio, an empty
    /// transcription, an unsupported language tag.
    #[error("invalid input: {0}")]
    Input(String),

    /// Query embedding or index search failed.
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] anyhow::Error),

    /// The generation backend failed or returned an unusable response.
    #[error("generation failed: {0}")]
    Generation(#[source] anyhow::Error),

    /// Speech synthesis failed.
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] anyhow::Error),

    /// Ingest, chunking, embedding, or install failed during a rebuild.
    #[error("index build failed: {0}")]
    IndexBuild(#[source] anyhow::Error),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Input(_) => Stage::Normalize,
            PipelineError::Retrieval(_) => Stage::Retrieve,
            PipelineError::Generation(_) => Stage::Generate,
            PipelineError::Synthesis(_) => Stage::Synthesize,
            PipelineError::IndexBuild(_) => Stage::IndexBuild,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            PipelineError::Input(_) => StatusCode::BAD_REQUEST,
            PipelineError::Retrieval(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Generation(_) | PipelineError::Synthesis(_) => {
                StatusCode::BAD_GATEWAY
            }
            PipelineError::IndexBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    stage: Stage,
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            stage: self.stage(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_variant_maps_to_its_stage() {
        assert_eq!(PipelineError::Input("x".into()).stage(), Stage::Normalize);
        assert_eq!(
            PipelineError::Retrieval(anyhow::anyhow!("down")).stage(),
            Stage::Retrieve
        );
        assert_eq!(
            PipelineError::Generation(anyhow::anyhow!("down")).stage(),
            Stage::Generate
        );
        assert_eq!(
            PipelineError::Synthesis(anyhow::anyhow!("down")).stage(),
            Stage::Synthesize
        );
        assert_eq!(
            PipelineError::IndexBuild(anyhow::anyhow!("down")).stage(),
            Stage::IndexBuild
        );
    }

    #[test]
    fn test_input_error_is_bad_request() {
        assert_eq!(
            PipelineError::Input("empty".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_stage_serializes_to_snake_case() {
        let json = serde_json::to_value(Stage::IndexBuild).unwrap();
        assert_eq!(json, "index_build");
    }

    #[test]
    fn test_error_body_carries_stage() {
        let err = PipelineError::Generation(anyhow::anyhow!("model offline"));
        let body = ErrorBody {
            error: err.to_string(),
            stage: err.stage(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stage"], "generate");
        assert!(json["error"].as_str().unwrap().contains("model offline"));
    }
}
