//! Tool-calling conversations with LLM providers, plus a router that picks
//! a provider per model identifier and falls back when the preferred one fails.

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod router;
pub mod server;
pub mod util;

#[cfg(test)]
mod testing;

pub use agent::llm::ChatTransport;
pub use agent::r#loop::AgentLoop;
pub use agent::types::{ChatRequest, ChatResponse, Message, Role, ToolCall, ToolDescriptor};
pub use error::{Error, Result};
pub use router::{ProviderRouter, RoutingTable};
