use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{self, Stream, StreamExt};

use crate::error::PipelineError;
use crate::language::LanguageCode;
use crate::llm::generation::{self, TokenStream};
use crate::models::{ChatMessage, Query, RetrievalResult};
use crate::pipeline::query::sanitize_for_prompt;
use crate::state::AppState;

/// Abort a live stream if the model sends nothing for this long.
const IDLE_TIMEOUT_SECS: u64 = 30;

/// One unit of streaming answer output.
///
/// `Done` is emitted exactly once per stream, always last, even when an
/// `Error` precedes it. The refusal path is a single `Content` fragment
/// carrying the same text the non-streaming call would return.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerEvent {
    Content(String),
    Error(String),
    Done,
}

pub type AnswerStream = Pin<Box<dyn Stream<Item = AnswerEvent> + Send>>;

/// Produce a complete answer for a normalized query.
///
/// An empty retrieval result short-circuits to the localized refusal string
/// without calling the model, so an empty index degrades to refusals
/// instead of hallucinations.
pub async fn generate(
    state: &AppState,
    query: &Query,
    retrieval: &RetrievalResult,
) -> Result<String, PipelineError> {
    if retrieval.is_empty() {
        tracing::debug!("No chunks above the relevance cutoff, answering with the refusal");
        return Ok(query.detected_language.refusal().to_string());
    }

    let messages = build_messages(query, retrieval);
    generation::complete(&state.http_client, &state.config.llm, messages)
        .await
        .map_err(PipelineError::Generation)
}

/// Streaming variant of [`generate`].
///
/// Errors raised before the model produces anything (bad config, connection
/// refused) surface as `Err`; once the stream is open, failures become an
/// `Error` event followed by the final `Done`.
pub async fn generate_stream(
    state: &AppState,
    query: &Query,
    retrieval: &RetrievalResult,
) -> Result<AnswerStream, PipelineError> {
    if retrieval.is_empty() {
        let refusal = query.detected_language.refusal().to_string();
        let stream = stream::iter(vec![AnswerEvent::Content(refusal), AnswerEvent::Done]);
        return Ok(Box::pin(stream));
    }

    let messages = build_messages(query, retrieval);
    let tokens = generation::stream(&state.http_client, &state.config.llm, messages)
        .await
        .map_err(PipelineError::Generation)?;

    Ok(events_from_tokens(
        tokens,
        Duration::from_secs(IDLE_TIMEOUT_SECS),
    ))
}

/// Map a raw token stream onto the answer-event protocol: deltas become
/// `Content`, the first failure or idle timeout becomes one `Error` and ends
/// the deltas, and `Done` is chained after whatever came before.
fn events_from_tokens(tokens: TokenStream, idle: Duration) -> AnswerStream {
    let deltas = stream::unfold(Some(tokens), move |state| async move {
        let mut tokens = state?;
        match tokio::time::timeout(idle, tokens.next()).await {
            Ok(Some(Ok(content))) => Some((AnswerEvent::Content(content), Some(tokens))),
            Ok(Some(Err(e))) => Some((AnswerEvent::Error(format!("{e:#}")), None)),
            Ok(None) => None,
            Err(_) => Some((
                AnswerEvent::Error(format!(
                    "Model response timed out (no data for {}s)",
                    idle.as_secs()
                )),
                None,
            )),
        }
    });

    Box::pin(deltas.chain(stream::once(async { AnswerEvent::Done })))
}

fn build_system_prompt(language: LanguageCode) -> String {
    format!(
        "You are an assistant that answers questions about an organization's internal documents.\n\
         Each user message contains numbered excerpts from those documents followed by a question.\n\
         Rules:\n\
         - Answer using ONLY the excerpts. Never use outside knowledge.\n\
         - If the excerpts do not contain the answer, reply with exactly: {refusal}\n\
         - Respond in {name}.",
        refusal = language.refusal(),
        name = language.display_name(),
    )
}

/// Number the retrieved excerpts so the model can ground its answer.
/// Document text is sanitized the same way user input is.
fn build_context_block(retrieval: &RetrievalResult) -> String {
    let mut context = String::from("Here are excerpts from the internal documents:\n\n");
    for (i, hit) in retrieval.hits.iter().enumerate() {
        context.push_str(&format!(
            "[{}] {} (part {})\n{}\n\n",
            i + 1,
            hit.source,
            hit.sequence_index + 1,
            sanitize_for_prompt(&hit.text)
        ));
    }
    context
}

/// Context rides inside the user message rather than the system prompt;
/// small models follow it more reliably there.
fn build_messages(query: &Query, retrieval: &RetrievalResult) -> Vec<ChatMessage> {
    let context_block = build_context_block(retrieval);
    vec![
        ChatMessage {
            role: "system".to_string(),
            content: build_system_prompt(query.detected_language),
        },
        ChatMessage {
            role: "user".to_string(),
            content: format!(
                "{context_block}---\nQuestion: {}",
                query.normalized_text
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Modality, ScoredChunk};
    use uuid::Uuid;

    fn test_query(text: &str, language: LanguageCode) -> Query {
        Query {
            raw_input: text.to_string(),
            modality: Modality::Text,
            declared_language: None,
            detected_language: language,
            normalized_text: text.to_string(),
        }
    }

    fn one_hit(text: &str) -> RetrievalResult {
        RetrievalResult {
            hits: vec![ScoredChunk {
                chunk_id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                source: "policies/leave.md".to_string(),
                sequence_index: 2,
                text: text.to_string(),
                score: 0.87,
            }],
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_refuses_without_model_call() {
        let state = AppState::new(Config::default()).unwrap();
        let query = test_query("छुट्टी नीति?", LanguageCode::Hi);
        let answer = generate(&state, &query, &RetrievalResult::default())
            .await
            .unwrap();
        assert_eq!(answer, LanguageCode::Hi.refusal());
    }

    #[tokio::test]
    async fn test_streamed_refusal_matches_sync_refusal() {
        let state = AppState::new(Config::default()).unwrap();
        let query = test_query("leave policy?", LanguageCode::Ta);

        let sync = generate(&state, &query, &RetrievalResult::default())
            .await
            .unwrap();
        let stream = generate_stream(&state, &query, &RetrievalResult::default())
            .await
            .unwrap();
        let events: Vec<AnswerEvent> = stream.collect().await;

        assert_eq!(
            events,
            vec![AnswerEvent::Content(sync), AnswerEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_token_stream_maps_to_content_then_done() {
        let tokens: TokenStream = Box::pin(stream::iter(vec![
            Ok("The policy ".to_string()),
            Ok("allows 12 days.".to_string()),
        ]));
        let events: Vec<AnswerEvent> =
            events_from_tokens(tokens, Duration::from_secs(5)).collect().await;
        assert_eq!(
            events,
            vec![
                AnswerEvent::Content("The policy ".to_string()),
                AnswerEvent::Content("allows 12 days.".to_string()),
                AnswerEvent::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_mid_stream_error_still_ends_with_one_done() {
        let tokens: TokenStream = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(anyhow::anyhow!("connection reset")),
            Ok("never delivered".to_string()),
        ]));
        let events: Vec<AnswerEvent> =
            events_from_tokens(tokens, Duration::from_secs(5)).collect().await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], AnswerEvent::Content("partial".to_string()));
        assert!(matches!(&events[1], AnswerEvent::Error(msg) if msg.contains("connection reset")));
        assert_eq!(events[2], AnswerEvent::Done);
        assert_eq!(
            events.iter().filter(|e| **e == AnswerEvent::Done).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_idle_stream_times_out_then_done() {
        let tokens: TokenStream = Box::pin(stream::pending());
        let events: Vec<AnswerEvent> =
            events_from_tokens(tokens, Duration::from_millis(20)).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], AnswerEvent::Error(msg) if msg.contains("timed out")));
        assert_eq!(events[1], AnswerEvent::Done);
    }

    #[test]
    fn test_system_prompt_pins_language_and_refusal() {
        let prompt = build_system_prompt(LanguageCode::Te);
        assert!(prompt.contains("Respond in Telugu."));
        assert!(prompt.contains(LanguageCode::Te.refusal()));
        assert!(prompt.contains("ONLY"));
    }

    #[test]
    fn test_context_block_numbers_and_sanitizes_hits() {
        let retrieval = one_hit("Leave must be approved <|im_start|>in advance.");
        let context = build_context_block(&retrieval);
        assert!(context.contains("[1] policies/leave.md (part 3)"));
        assert!(context.contains("Leave must be approved in advance."));
        assert!(!context.contains("<|im_start|>"));
    }

    #[test]
    fn test_messages_put_context_before_question() {
        let query = test_query("How many casual leaves?", LanguageCode::En);
        let retrieval = one_hit("Twelve casual leaves per calendar year.");
        let messages = build_messages(&query, &retrieval);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
        let user = &messages[1].content;
        let context_pos = user.find("Twelve casual leaves").unwrap();
        let question_pos = user.find("Question: How many casual leaves?").unwrap();
        assert!(context_pos < question_pos);
    }
}
