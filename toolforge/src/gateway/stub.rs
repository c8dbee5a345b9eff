//! Scripted provider for tests and offline dry runs.
//!
//! Responses are queued per request kind and consumed in order. Every request
//! is recorded so tests can inspect prompts and temperatures.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::{CompletionRequest, GatewayError, LlmProvider, LlmProviderInfo, RequestKind};

#[derive(Default)]
pub struct StubLlmProvider {
    queues: Mutex<HashMap<RequestKind, VecDeque<Result<String, String>>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, kind: RequestKind, response: impl Into<String>) {
        self.enqueue(kind, Ok(response.into()));
    }

    /// Queue a transport failure for the next request of `kind`.
    pub fn push_failure(&self, kind: RequestKind, message: impl Into<String>) {
        self.enqueue(kind, Err(message.into()));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn requests_of(&self, kind: RequestKind) -> Vec<CompletionRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect()
    }

    pub fn pending(&self, kind: RequestKind) -> usize {
        self.queues
            .lock()
            .map(|q| q.get(&kind).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    fn enqueue(&self, kind: RequestKind, entry: Result<String, String>) {
        if let Ok(mut queues) = self.queues.lock() {
            queues.entry(kind).or_default().push_back(entry);
        }
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GatewayError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request.clone());
        }
        let next = self
            .queues
            .lock()
            .map_err(|_| GatewayError::Unavailable("stub provider lock poisoned".to_string()))?
            .get_mut(&request.kind)
            .and_then(VecDeque::pop_front);
        match next {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(GatewayError::Unavailable(message)),
            None => Err(GatewayError::Unavailable(format!(
                "stub provider has no scripted {} response",
                request.kind
            ))),
        }
    }

    fn info(&self) -> LlmProviderInfo {
        LlmProviderInfo {
            name: "stub".to_string(),
            model: "scripted".to_string(),
        }
    }
}
