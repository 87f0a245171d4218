pub mod openai;
pub mod proxy;

use async_trait::async_trait;

use crate::agent::types::{ChatRequest, ChatResponse};
use crate::error::Result;

/// Anything that can complete a chat request: an HTTP provider, the proxy, or the router.
///
/// Implementations are shared between conversations and must be stateless per call.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse>;
}
