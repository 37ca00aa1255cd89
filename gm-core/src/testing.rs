//! Test support for driving the game master without a live API.
//!
//! [`ScriptedProvider`] plays back queued responses and stream scripts
//! in order, recording every request it receives so tests can assert
//! on the exact transcript the dispatch loop built.

use crate::provider::{ChatProvider, ChunkStream};
use futures::stream;
use openrouter::{ChatResponse, Error, Request, StreamChunk};
use std::collections::VecDeque;

/// A chat provider that replays a fixed script.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: VecDeque<ChatResponse>,
    streams: VecDeque<Vec<StreamChunk>>,
    requests: Vec<Request>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a buffered response for the next `chat` call.
    pub fn push_response(mut self, response: ChatResponse) -> Self {
        self.responses.push_back(response);
        self
    }

    /// Queue a chunk script for the next `chat_stream` call.
    pub fn push_stream(mut self, chunks: Vec<StreamChunk>) -> Self {
        self.streams.push_back(chunks);
        self
    }

    /// Total calls made, buffered and streamed combined.
    pub fn chat_calls(&self) -> usize {
        self.requests.len()
    }

    /// Every request received, in call order.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn last_request(&self) -> Option<&Request> {
        self.requests.last()
    }
}

impl ChatProvider for ScriptedProvider {
    async fn chat(&mut self, request: Request) -> Result<ChatResponse, Error> {
        self.requests.push(request);
        self.responses
            .pop_front()
            .ok_or_else(|| Error::Config("scripted provider has no responses left".to_string()))
    }

    async fn chat_stream(&mut self, request: Request) -> Result<ChunkStream, Error> {
        self.requests.push(request);
        let chunks = self
            .streams
            .pop_front()
            .ok_or_else(|| Error::Config("scripted provider has no streams left".to_string()))?;
        let items: Vec<Result<StreamChunk, Error>> = chunks.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}
