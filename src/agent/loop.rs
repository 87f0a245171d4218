use std::future::Future;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::llm::ChatTransport;
use super::tool::{ToolCandidate, ToolRegistry};
use super::types::{ChatRequest, Message, ToolCall};
use crate::error::{ConfigError, ProtocolError, Result};

/// Model identifier that lets the router pick a provider
pub const AUTO_MODEL: &str = "auto";

/// Conversation with a model that may call locally registered tools.
///
/// Each [`request`](AgentLoop::request) is one turn: history goes out with
/// every tool descriptor, requested tool calls run in the order the model
/// issued them, and the loop ends on the first answer without tool calls.
pub struct AgentLoop {
    transport: Arc<dyn ChatTransport>,
    tools: ToolRegistry,
    messages: Vec<Message>,
    model: String,
    max_rounds: Option<usize>,
}

impl AgentLoop {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            tools: ToolRegistry::new(),
            messages: Vec::new(),
            model: AUTO_MODEL.to_string(),
            max_rounds: None,
        }
    }

    /// Seed the history with one system message per prompt
    pub fn system_prompts<I, S>(mut self, prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.messages.extend(prompts.into_iter().map(Message::system));
        self
    }

    /// Replace the tool set
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Address a model other than the router's automatic choice
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Fail a turn once it needs more than `max_rounds` model calls (unbounded by default)
    pub fn max_rounds(mut self, max_rounds: Option<usize>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn register<Req, Resp, F, Fut>(
        &mut self,
        name: &str,
        description: &str,
        operation: F,
    ) -> Result<(), ConfigError>
    where
        Req: DeserializeOwned + JsonSchema + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
    {
        self.tools.register(name, description, operation)
    }

    pub fn register_all<'a>(
        &mut self,
        candidates: Vec<ToolCandidate>,
        descriptions: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), ConfigError> {
        self.tools.register_all(candidates, descriptions)
    }

    pub fn add_message(&mut self, message: Message) {
        trace!(
            "Adding message: role={:?}, content_len={}",
            message.role,
            message.content.as_deref().map_or(0, str::len)
        );
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn and return the text of every round joined by newlines
    pub async fn request(&mut self, user_prompt: &str) -> Result<String> {
        self.add_message(Message::user(user_prompt));
        trace!("Starting agent loop with {} messages", self.messages.len());

        let mut answer_parts: Vec<String> = Vec::new();
        let mut round = 0;

        loop {
            round += 1;
            if let Some(max) = self.max_rounds {
                if round > max {
                    return Err(ProtocolError::TooManyRounds(max).into());
                }
            }

            let answer = self.ask_model().await?;
            debug!(
                "Model answer (round {}): {}",
                round,
                serde_json::to_string(&answer).unwrap_or_default()
            );

            if let Some(content) = answer.content.as_deref().filter(|c| !c.is_empty()) {
                answer_parts.push(content.to_string());
            }

            let calls = answer.requested_calls().to_vec();
            if calls.is_empty() {
                debug!("Agent loop completed after {} rounds", round);
                break;
            }

            debug!("Model requested {} tool calls", calls.len());
            for call in &calls {
                self.call_tool(call, &calls).await?;
            }
        }

        Ok(answer_parts.join("\n"))
    }

    async fn ask_model(&mut self) -> Result<Message> {
        let request = ChatRequest::new(self.model.clone(), self.messages.clone())
            .with_tools(self.tools.describe_all());
        trace!(
            "Calling model with {} messages and {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let response = self.transport.send(&request).await?;
        // The transport's view of the history is authoritative
        self.messages = response.messages;
        self.messages
            .last()
            .cloned()
            .ok_or_else(|| ProtocolError::EmptyResponse.into())
    }

    async fn call_tool(&mut self, call: &ToolCall, round_calls: &[ToolCall]) -> Result<()> {
        // The result message must point back at a real call
        if call.id.is_empty() {
            return Err(ProtocolError::EmptyCallId(call.name.clone()).into());
        }
        let tool = self.tools.find_by_name(&call.name)?;
        debug!("Tool found: {}", tool.name());
        debug!("Input: {}", call.arguments);

        let output = tool.invoke(&call.arguments).await?;
        debug!("Output: {}", output);

        self.messages
            .push(Message::tool_result(call.id.clone(), output, round_calls.to_vec()));
        Ok(())
    }
}
