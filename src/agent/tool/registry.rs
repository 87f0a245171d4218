use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::descriptor::describe;
use crate::agent::types::ToolDescriptor;
use crate::error::{ConfigError, Error, ProtocolError, Result};

type Handler = Arc<dyn Fn(String) -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Descriptor bound to the local operation that serves it
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    handler: Handler,
}

impl RegisteredTool {
    /// Wrap an async operation taking one typed request.
    ///
    /// The request type is reflected into the descriptor here, so a
    /// malformed tool fails at registration and never at call time.
    pub fn new<Req, Resp, F, Fut>(name: &str, description: &str, operation: F) -> Result<Self, ConfigError>
    where
        Req: DeserializeOwned + JsonSchema + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
    {
        let descriptor = describe::<Req>(name, description)?;
        let tool = name.to_string();
        let handler: Handler = Arc::new(move |arguments: String| -> BoxFuture<'static, Result<String>> {
            let tool = tool.clone();
            let request = match serde_json::from_str::<Req>(&arguments) {
                Ok(request) => request,
                Err(source) => {
                    let err: Error = ProtocolError::InvalidArguments { tool, source }.into();
                    return Box::pin(futures::future::ready(Err(err)));
                }
            };
            let pending = operation(request);
            Box::pin(async move {
                let response = pending.await.map_err(|source| Error::Tool {
                    name: tool.clone(),
                    source,
                })?;
                let output = serde_json::to_string(&response)
                    .map_err(|source| ProtocolError::InvalidResult { tool, source })?;
                Ok::<String, Error>(output)
            })
        });
        Ok(Self {
            descriptor,
            handler,
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Decode the raw JSON arguments, run the operation, return its JSON result
    pub async fn invoke(&self, arguments: &str) -> Result<String> {
        (self.handler)(arguments.to_string()).await
    }
}

impl fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Named operation waiting for a description before it becomes a tool
pub struct ToolCandidate {
    name: String,
    bind: Box<dyn FnOnce(&str) -> Result<RegisteredTool, ConfigError> + Send>,
}

impl ToolCandidate {
    pub fn new<Req, Resp, F, Fut>(name: &str, operation: F) -> Self
    where
        Req: DeserializeOwned + JsonSchema + Send + 'static,
        Resp: Serialize + Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Resp>> + Send + 'static,
    {
        let tool = name.to_string();
        Self {
            name: name.to_string(),
            bind: Box::new(move |description: &str| RegisteredTool::new(&tool, description, operation)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Tools available to one conversation, in registration order
#[derive(Clone, Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
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
        let tool = RegisteredTool::new(name, description, operation)?;
        self.insert(tool)
    }

    /// Register every described candidate; a description naming no candidate is an error
    pub fn register_all<'a>(
        &mut self,
        candidates: Vec<ToolCandidate>,
        descriptions: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<(), ConfigError> {
        let mut candidates = candidates;
        for (name, description) in descriptions {
            let position = candidates
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| ConfigError::UnknownCandidate(name.to_string()))?;
            let candidate = candidates.swap_remove(position);
            self.insert((candidate.bind)(description)?)?;
        }
        Ok(())
    }

    /// Add an already built tool
    pub fn insert(&mut self, tool: RegisteredTool) -> Result<(), ConfigError> {
        if self.tools.iter().any(|t| t.name() == tool.name()) {
            return Err(ConfigError::DuplicateTool(tool.name().to_string()));
        }
        debug!("Tool registered: {:?}", tool.descriptor);
        self.tools.push(tool);
        Ok(())
    }

    pub fn find_by_name(&self, name: &str) -> Result<&RegisteredTool, ProtocolError> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ProtocolError::ToolNotFound(name.to_string()))
    }

    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct AdviceRequest {
        /// Situation description to give advice
        situation: String,
    }

    #[derive(Serialize)]
    struct AdviceResponse {
        advice: String,
    }

    #[derive(Deserialize, JsonSchema)]
    struct CountRequest {
        /// Items to count
        items: Vec<String>,
        /// Only count items longer than this
        min_len: Option<usize>,
    }

    async fn advice(req: AdviceRequest) -> anyhow::Result<AdviceResponse> {
        Ok(AdviceResponse {
            advice: format!("Regarding '{}': never ask silly questions.", req.situation),
        })
    }

    async fn count(req: CountRequest) -> anyhow::Result<usize> {
        let min = req.min_len.unwrap_or(0);
        Ok(req.items.iter().filter(|i| i.len() > min).count())
    }

    #[test]
    fn test_find_by_name_after_register() {
        let mut registry = ToolRegistry::new();
        registry.register("advice", "Get daily advice", advice).unwrap();
        registry.register("count", "Count items", count).unwrap();

        let tool = registry.find_by_name("count").unwrap();
        assert_eq!(tool.descriptor.name, "count");
        assert_eq!(tool.descriptor.parameters.len(), 2);
        assert!(matches!(
            registry.find_by_name("missing"),
            Err(ProtocolError::ToolNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_describe_all_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register("count", "Count items", count).unwrap();
        registry.register("advice", "Get daily advice", advice).unwrap();
        let names: Vec<String> = registry.describe_all().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["count", "advice"]);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register("advice", "Get daily advice", advice).unwrap();
        let err = registry.register("advice", "Again", advice).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTool(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_primitive_argument_fails_at_registration() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .register("echo", "Echo text", |text: String| async move { Ok::<_, anyhow::Error>(text) })
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotARecord(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_register_all_binds_described_candidates() {
        let mut registry = ToolRegistry::new();
        let candidates = vec![
            ToolCandidate::new("advice", advice),
            ToolCandidate::new("count", count),
        ];
        registry
            .register_all(candidates, [("advice", "Get daily advice")])
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.find_by_name("advice").unwrap().descriptor.description,
            "Get daily advice"
        );
    }

    #[test]
    fn test_register_all_rejects_unknown_names() {
        let mut registry = ToolRegistry::new();
        let err = registry
            .register_all(vec![ToolCandidate::new("advice", advice)], [("wisdom", "?")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCandidate(name) if name == "wisdom"));
    }

    #[tokio::test]
    async fn test_invoke_decodes_and_serializes() {
        let mut registry = ToolRegistry::new();
        registry.register("count", "Count items", count).unwrap();
        let tool = registry.find_by_name("count").unwrap();

        let result = tool
            .invoke(r#"{"items":["a","bbb","cc"],"min_len":1}"#)
            .await
            .unwrap();
        assert_eq!(result, "2");

        let err = tool.invoke(r#"{"items":"nope"}"#).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::InvalidArguments { .. })
        ));
    }

    #[tokio::test]
    async fn test_operation_failure_is_reported_with_tool_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register("advice", "Get daily advice", |_: AdviceRequest| async move {
                Err::<AdviceResponse, _>(anyhow::anyhow!("out of wisdom"))
            })
            .unwrap();
        let err = registry
            .find_by_name("advice")
            .unwrap()
            .invoke(r#"{"situation":"lost"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tool { ref name, .. } if name == "advice"));
    }
}
