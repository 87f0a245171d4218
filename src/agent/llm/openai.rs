use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, trace};

use super::ChatTransport;
use crate::agent::types::{
    ChatRequest, ChatResponse, Message, ParamFormat, ParamType, Role, ToolCall, ToolChoice,
    ToolDescriptor,
};
use crate::error::{ConfigError, Result, TransportError};

/// Number of decimal places for elapsed time display
const ELAPSED_TIME_PRECISION: usize = 2;

#[derive(Serialize, Debug)]
struct CompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Serialize, Deserialize, Debug)]
struct WireMessage {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Serialize, Deserialize, Debug)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize, Debug)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: WireFunction,
}

#[derive(Serialize, Debug)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: WireMessage,
}

fn function_type() -> String {
    "function".into()
}

/// OpenAI-compatible chat-completions provider
pub struct OpenAITransport {
    name: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Sentinel model identifier and the concrete model sent in its place
    auto_model: Option<(String, String)>,
}

impl OpenAITransport {
    /// Create a provider; `name` only shows up in logs
    pub fn new(name: &str, base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Self::with_headers(name, base_url, api_key, timeout, &HashMap::new())
    }

    /// Create a provider sending extra headers with every request
    pub fn with_headers(
        name: &str,
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        headers: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        for (key, value) in headers {
            let header_name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| ConfigError::InvalidHeader(key.clone()))?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader(key.clone()))?;
            default_headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            name: name.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            auto_model: None,
        })
    }

    /// Send `model` upstream whenever a request asks for `sentinel`
    pub fn with_auto_model(mut self, sentinel: &str, model: &str) -> Self {
        self.auto_model = Some((sentinel.to_string(), model.to_string()));
        self
    }

    fn wire_model<'a>(&'a self, requested: &'a str) -> &'a str {
        match &self.auto_model {
            Some((sentinel, model)) if sentinel == requested => model.as_str(),
            _ => requested,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl ChatTransport for OpenAITransport {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        trace!(
            "[{}] Request: model={}, {} messages, {} tools",
            self.name,
            request.model,
            request.messages.len(),
            request.tools.len()
        );
        let start = Instant::now();

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&to_completion_request(request, self.wire_model(&request.model)))
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status, body }.into());
        }

        let completion: CompletionResponse = response.json().await.map_err(TransportError::Http)?;
        debug!(
            "[{}] Completed in {:.prec$}s with {} choices",
            self.name,
            start.elapsed().as_secs_f64(),
            completion.choices.len(),
            prec = ELAPSED_TIME_PRECISION
        );

        // First choice is the primary response
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(TransportError::NoChoices)?;

        let mut messages = request.messages.clone();
        messages.push(from_wire_message(choice.message));
        Ok(ChatResponse { messages })
    }
}

fn to_completion_request(request: &ChatRequest, model: &str) -> CompletionRequest {
    let tools: Vec<WireTool> = request.tools.iter().map(to_wire_tool).collect();
    let has_tools = !tools.is_empty();
    CompletionRequest {
        model: model.to_string(),
        messages: request.messages.iter().map(to_wire_message).collect(),
        tools: has_tools.then_some(tools),
        tool_choice: has_tools.then_some(request.tool_choice),
    }
}

fn to_wire_message(message: &Message) -> WireMessage {
    // Tool calls are only meaningful on the assistant turn that issued them
    let tool_calls = match message.role {
        Role::Assistant => message
            .tool_calls
            .as_ref()
            .filter(|calls| !calls.is_empty())
            .map(|calls| calls.iter().map(to_wire_call).collect()),
        _ => None,
    };
    WireMessage {
        role: message.role,
        content: message.content.clone().filter(|c| !c.is_empty()),
        tool_calls,
        tool_call_id: message.tool_call_id.clone().filter(|id| !id.is_empty()),
    }
}

fn to_wire_call(call: &ToolCall) -> WireToolCall {
    WireToolCall {
        id: call.id.clone(),
        call_type: function_type(),
        function: WireFunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

fn from_wire_message(message: WireMessage) -> Message {
    Message {
        role: message.role,
        content: message.content,
        tool_call_id: message.tool_call_id,
        tool_calls: message.tool_calls.filter(|calls| !calls.is_empty()).map(|calls| {
            calls
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect()
        }),
    }
}

fn to_wire_tool(tool: &ToolDescriptor) -> WireTool {
    let mut properties = Map::new();
    for param in &tool.parameters {
        let mut property = Map::new();
        property.insert("type".into(), json!(schema_type(param.param_type)));
        if let Some(format) = schema_format(param.format) {
            property.insert("format".into(), json!(format));
        }
        property.insert("description".into(), json!(param.description));
        properties.insert(param.name.clone(), Value::Object(property));
    }
    let required: Vec<&str> = tool
        .parameters
        .iter()
        .filter(|p| p.required)
        .map(|p| p.name.as_str())
        .collect();

    WireTool {
        tool_type: function_type(),
        function: WireFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        },
    }
}

fn schema_type(param_type: ParamType) -> &'static str {
    match param_type {
        ParamType::Int => "integer",
        ParamType::Float => "number",
        ParamType::Bool => "boolean",
        ParamType::String => "string",
        ParamType::Object => "object",
    }
}

fn schema_format(format: ParamFormat) -> Option<&'static str> {
    match format {
        ParamFormat::Plain | ParamFormat::String => None,
        ParamFormat::Uuid => Some("uuid"),
        ParamFormat::Datetime => Some("date-time"),
        ParamFormat::Date => Some("date"),
        ParamFormat::Time => Some("time"),
        ParamFormat::Duration => Some("duration"),
    }
}
