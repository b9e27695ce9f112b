//! Shared test helpers for reasoning and streaming tests.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use wayfarer_core::error::ProviderError;
use wayfarer_core::message::Message;
use wayfarer_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk,
};

/// A mock provider that streams a sequence of scripted completions.
///
/// Each call to `stream` (or `complete`) consumes the next script. A
/// script is a list of chunks; an `Err` script fails the call outright.
/// Panics if more calls are made than scripts provided.
pub struct ScriptedProvider {
    scripts: Mutex<Vec<Result<Vec<String>, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Vec<&str>>) -> Self {
        Self::with_results(
            scripts
                .into_iter()
                .map(|chunks| Ok(chunks.into_iter().map(String::from).collect()))
                .collect(),
        )
    }

    pub fn with_results(scripts: Vec<Result<Vec<String>, ProviderError>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// One completion per script, each sent as a single chunk.
    pub fn completions<S: Into<String>>(texts: Vec<S>) -> Self {
        Self::with_results(texts.into_iter().map(|t| Ok(vec![t.into()])).collect())
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The user prompt of the n-th call.
    pub fn prompt(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n]
            .messages
            .last()
            .unwrap()
            .content
            .clone()
    }

    fn next_script(&self, request: ProviderRequest) -> Result<Vec<String>, ProviderError> {
        let mut scripts = self.scripts.lock().unwrap();
        let mut requests = self.requests.lock().unwrap();
        if scripts.is_empty() {
            panic!(
                "ScriptedProvider: no more scripts (call #{})",
                requests.len()
            );
        }
        requests.push(request);
        scripts.remove(0)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let text = self.next_script(request)?.concat();
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model,
        })
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let chunks = self.next_script(request)?;
        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(chunk),
                    ..StreamChunk::default()
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                done: true,
                ..StreamChunk::default()
            }))
            .await;
        Ok(rx)
    }
}

/// A completion that calls one tool.
pub fn action(thought: &str, tool: &str, city: &str) -> String {
    format!(" {thought}\nAction: {tool}\nAction Input: {city}")
}

/// A completion that finishes.
pub fn finish(answer: &str) -> String {
    format!(" I now know the final answer\nFinal Answer: {answer}")
}
