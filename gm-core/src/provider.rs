//! Chat provider seam.
//!
//! The game master talks to its model through [`ChatProvider`] rather
//! than a concrete client, so the dispatch loop can be driven by a
//! scripted provider in tests. [`openrouter::Client`] is the production
//! implementation.

use futures::Stream;
use openrouter::{ChatResponse, Error, Request, StreamChunk};
use std::future::Future;
use std::pin::Pin;

/// A boxed stream of incremental chat completion chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, Error>> + Send>>;

/// Abstraction over a chat completion backend.
pub trait ChatProvider: Send {
    /// Request a complete chat response.
    fn chat(&mut self, request: Request)
        -> impl Future<Output = Result<ChatResponse, Error>> + Send;

    /// Request a streamed chat response.
    fn chat_stream(
        &mut self,
        request: Request,
    ) -> impl Future<Output = Result<ChunkStream, Error>> + Send;
}

impl ChatProvider for openrouter::Client {
    async fn chat(&mut self, request: Request) -> Result<ChatResponse, Error> {
        openrouter::Client::chat(self, request).await
    }

    async fn chat_stream(&mut self, request: Request) -> Result<ChunkStream, Error> {
        openrouter::Client::chat_stream(self, request).await
    }
}
