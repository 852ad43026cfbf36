//! Test double for [`LlmProvider`]
//!
//! Answers are scripted up front and handed out one per call. Once the
//! script runs out every call gets `"ok"`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::providers::{LlmMessage, LlmProvider, ProviderError};

/// What the provider was asked
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<LlmMessage>,
    pub model: String,
}

#[derive(Default)]
struct Script {
    answers: VecDeque<Result<String, ProviderError>>,
    delay: Option<Duration>,
    panics: bool,
    calls: Vec<RecordedCall>,
}

#[derive(Clone, Default)]
pub struct MockLlmProvider {
    script: Arc<Mutex<Script>>,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_reply(self, content: impl Into<String>) -> Self {
        self.script
            .lock()
            .unwrap()
            .answers
            .push_back(Ok(content.into()));
        self
    }

    pub fn then_fail(self, error: ProviderError) -> Self {
        self.script.lock().unwrap().answers.push_back(Err(error));
        self
    }

    /// Every call sleeps this long before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().delay = Some(delay);
        self
    }

    /// Every call panics instead of answering
    pub fn panicking(self) -> Self {
        self.script.lock().unwrap().panics = true;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockLlmProvider {
    async fn chat(&self, messages: Vec<LlmMessage>, model: &str) -> Result<String, ProviderError> {
        let (answer, delay, panics) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(RecordedCall {
                messages,
                model: model.to_string(),
            });
            let answer = script
                .answers
                .pop_front()
                .unwrap_or_else(|| Ok("ok".to_string()));
            (answer, script.delay, script.panics)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panics {
            panic!("scripted provider panic");
        }
        answer
    }

    fn default_model(&self) -> String {
        "mock-model".to_string()
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Role;

    #[tokio::test]
    async fn test_answers_follow_script() {
        let provider = MockLlmProvider::new()
            .then_reply("first")
            .then_fail(ProviderError::network("down"));
        let turn = vec![LlmMessage::new(Role::User, "hi")];

        assert_eq!(provider.chat(turn.clone(), "m").await.unwrap(), "first");
        assert!(provider.chat(turn.clone(), "m").await.is_err());
        assert_eq!(provider.chat(turn, "m").await.unwrap(), "ok");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_records_context_and_model() {
        let provider = MockLlmProvider::new();
        provider
            .chat(vec![LlmMessage::new(Role::User, "hi")], "gpt-x")
            .await
            .unwrap();

        let calls = provider.calls();
        assert_eq!(calls[0].model, "gpt-x");
        assert_eq!(calls[0].messages[0].content, "hi");
    }
}
