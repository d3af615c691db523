//! `FallbackChain`: an ordered list of LLM client candidates, tried in
//! sequence on transient failures (§4.2.3).

use crate::errors::{Result, RuntimeError};
use crate::llm::provider::{CompletionRequest, LlmClient};
use async_trait::async_trait;

/// Not its own client's decorator — a nonempty ordered candidate list with
/// its own retry policy, per Design Notes "Fallback chain vs. wrapper".
pub struct FallbackChain {
    candidates: Vec<Box<dyn LlmClient>>,
}

impl FallbackChain {
    /// `candidates` must be nonempty; the primary is `candidates[0]`.
    pub fn new(candidates: Vec<Box<dyn LlmClient>>) -> Self {
        assert!(!candidates.is_empty(), "FallbackChain requires at least one candidate");
        Self { candidates }
    }

    fn is_retriable(err: &RuntimeError) -> bool {
        matches!(err, RuntimeError::Transient(_))
    }
}

#[async_trait]
impl LlmClient for FallbackChain {
    async fn complete(&self, request: CompletionRequest) -> Result<crate::types::CompletionResponse> {
        let mut last_err: Option<RuntimeError> = None;
        for candidate in &self.candidates {
            match candidate.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(err) if Self::is_retriable(&err) => {
                    tracing::warn!(candidate = candidate.identity(), error = %err, "candidate failed, trying next");
                    last_err = Some(err);
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(RuntimeError::FallbackExhausted(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no candidates configured".to_string()),
        ))
    }

    fn identity(&self) -> String {
        self.candidates[0].identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionResponse, FinishReason, Message, TokenUsage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedClient {
        name: String,
        calls: Arc<AtomicUsize>,
        outcome: fn() -> Result<CompletionResponse>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }

        fn identity(&self) -> String {
            self.name.clone()
        }
    }

    fn ok_response() -> Result<CompletionResponse> {
        Ok(CompletionResponse {
            finish_reason: FinishReason::Stop,
            message: Some(Message::assistant("ok")),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        })
    }

    fn req() -> CompletionRequest {
        CompletionRequest { system_prompt: String::new(), messages: vec![Message::user("hi")], tools: Vec::new() }
    }

    #[tokio::test]
    async fn transient_error_advances_to_next_candidate() {
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(vec![
            Box::new(ScriptedClient {
                name: "a".into(),
                calls: calls_a.clone(),
                outcome: || Err(RuntimeError::Transient("503".into())),
            }),
            Box::new(ScriptedClient { name: "b".into(), calls: calls_b.clone(), outcome: ok_response }),
        ]);
        let response = chain.complete(req()).await.unwrap();
        assert_eq!(response.message.unwrap().content, "ok");
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn authentication_error_does_not_try_fallbacks() {
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(vec![
            Box::new(ScriptedClient {
                name: "a".into(),
                calls: calls_a.clone(),
                outcome: || Err(RuntimeError::Authentication("bad key".into())),
            }),
            Box::new(ScriptedClient { name: "b".into(), calls: calls_b.clone(), outcome: ok_response }),
        ]);
        let err = chain.complete(req()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Authentication(_)));
        assert_eq!(calls_b.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausting_all_candidates_returns_last_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FallbackChain::new(vec![Box::new(ScriptedClient {
            name: "a".into(),
            calls: calls.clone(),
            outcome: || Err(RuntimeError::Transient("down".into())),
        })]);
        let err = chain.complete(req()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::FallbackExhausted(_)));
    }
}
