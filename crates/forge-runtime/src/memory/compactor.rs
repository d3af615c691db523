//! Budget-triggered transcript compaction (§4.3).

use crate::errors::Result;
use crate::llm::{CompletionRequest, LlmClient};
use crate::memory::session_store::SessionStore;
use crate::types::{Message, Role};
use std::sync::Arc;

pub struct Compactor {
    llm: Arc<dyn LlmClient>,
    sessions: Option<Arc<SessionStore>>,
}

impl Compactor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, sessions: None }
    }

    pub fn with_session_store(mut self, sessions: Arc<SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Select the longest contiguous prefix (excluding the most recent user
    /// message) whose removal brings serialized size under `0.5 * budget`.
    fn select_prefix_len(&self, transcript: &[Message], budget: usize) -> usize {
        if transcript.is_empty() {
            return 0;
        }
        let last_user_idx = transcript.iter().rposition(|m| m.role == Role::User);
        let max_cut = last_user_idx.unwrap_or(transcript.len());

        let target = (budget as f64 * 0.5) as usize;
        let mut cut = 0;
        for candidate in (0..=max_cut).rev() {
            let remaining_len: usize = transcript[candidate..].iter().map(Message::char_len).sum();
            if remaining_len <= target {
                cut = candidate;
                break;
            }
        }
        cut
    }

    /// Run compaction, returning the new transcript. On summarization
    /// failure, logs and returns the transcript unchanged.
    pub async fn compact(&self, session_id: Option<&str>, transcript: Vec<Message>, budget: usize) -> Vec<Message> {
        let cut = self.select_prefix_len(&transcript, budget);
        if cut == 0 {
            return transcript;
        }

        let (prefix, suffix) = transcript.split_at(cut);
        match self.summarize(prefix).await {
            Ok(summary) => {
                let mut compacted = Vec::with_capacity(1 + suffix.len());
                compacted.push(Message::system(summary));
                compacted.extend_from_slice(suffix);

                if let (Some(id), Some(store)) = (session_id, &self.sessions) {
                    if let Err(err) = store.overwrite(id, &compacted) {
                        tracing::warn!(session_id = id, error = %err, "failed to persist compacted session");
                    }
                }
                compacted
            }
            Err(err) => {
                tracing::warn!(error = %err, "compaction summarization failed, proceeding with full transcript");
                transcript
            }
        }
    }

    async fn summarize(&self, prefix: &[Message]) -> Result<String> {
        let mut instruction = String::from(
            "Summarize the following conversation history concisely, preserving any facts, \
             decisions, and open threads the assistant will need to continue the task:\n\n",
        );
        for message in prefix {
            instruction.push_str(&format!("{:?}: {}\n", message.role, message.content));
        }

        let request = CompletionRequest {
            system_prompt: "You produce compact, factual summaries of agent conversation history.".to_string(),
            messages: vec![Message::user(instruction)],
            tools: Vec::new(),
        };
        let response = self.llm.complete(request).await?;
        Ok(response.message.map(|m| m.content).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompletionResponse, FinishReason, TokenUsage};
    use async_trait::async_trait;

    struct StubLlm {
        summary: String,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                finish_reason: FinishReason::Stop,
                message: Some(Message::assistant(self.summary.clone())),
                tool_calls: Vec::new(),
                usage: TokenUsage::default(),
            })
        }

        fn identity(&self) -> String {
            "stub".to_string()
        }
    }

    fn long_message(role_fn: fn(&str) -> Message, filler: &str) -> Message {
        role_fn(filler)
    }

    #[tokio::test]
    async fn compacts_prefix_and_preserves_recent_suffix() {
        let filler = "x".repeat(100);
        let transcript = vec![
            long_message(Message::user, &filler),
            long_message(Message::assistant, &filler),
            long_message(Message::user, &filler),
            long_message(Message::assistant, &filler),
            Message::user("final question"),
        ];
        let compactor = Compactor::new(Arc::new(StubLlm { summary: "summary text".to_string() }));
        let compacted = compactor.compact(None, transcript, 100).await;
        assert!(compacted.iter().any(|m| m.role == Role::System && m.content == "summary text"));
        assert_eq!(compacted.last().unwrap().content, "final question");
    }

    #[tokio::test]
    async fn leaves_transcript_unchanged_when_under_budget() {
        let transcript = vec![Message::user("hi")];
        let compactor = Compactor::new(Arc::new(StubLlm { summary: "s".to_string() }));
        let compacted = compactor.compact(None, transcript.clone(), 1_000_000).await;
        assert_eq!(compacted.len(), transcript.len());
    }
}
