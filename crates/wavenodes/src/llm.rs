use crate::parse_config;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use waveruntime::{NodeFactory, NodeMetadata};
use wavecore::{
    CompletionRequest, ExecutionContext, LlmClient, NodeError, NodeExecutor, NodeOutput, NodeSpec,
    NodeType,
};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ModelChoice {
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

impl ModelChoice {
    /// Request for `user_prompt` against the configured (or default) model.
    pub fn request(&self, user_prompt: impl Into<String>) -> CompletionRequest {
        CompletionRequest::new(
            self.provider_id
                .as_deref()
                .unwrap_or(CompletionRequest::DEFAULT_PROVIDER),
            self.model_id
                .as_deref()
                .unwrap_or(CompletionRequest::DEFAULT_MODEL),
            user_prompt,
        )
    }
}

#[derive(Debug, Deserialize)]
struct LlmConfig {
    #[serde(flatten)]
    model: ModelChoice,
    #[serde(default)]
    system_prompt: Option<String>,
    #[serde(default)]
    user_prompt: Option<String>,
    #[serde(default)]
    temperature: Option<f64>,
    #[serde(default)]
    max_tokens: Option<u32>,
}

/// Single chat completion; emits `{text}`.
pub struct LlmNode {
    id: String,
    config: LlmConfig,
    llm: Arc<dyn LlmClient>,
}

#[async_trait]
impl NodeExecutor for LlmNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Llm
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let user_prompt = ctx.resolve_template(self.config.user_prompt.as_deref().unwrap_or_default());
        let system_prompt = self
            .config
            .system_prompt
            .as_deref()
            .map(|prompt| ctx.resolve_template(prompt))
            .filter(|prompt| !prompt.is_empty());

        let mut request = self.config.model.request(user_prompt);
        request.system_prompt = system_prompt;
        if let Some(temperature) = self.config.temperature {
            request.temperature = temperature;
        }
        if let Some(max_tokens) = self.config.max_tokens {
            request.max_tokens = max_tokens;
        }

        tracing::debug!("LLM node {} calling {}/{}", self.id, request.provider, request.model);
        let text = self.llm.complete(request).await?;
        Ok(NodeOutput::new().with_output("text", text))
    }
}

pub struct LlmNodeFactory {
    llm: Arc<dyn LlmClient>,
}

impl LlmNodeFactory {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

impl NodeFactory for LlmNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(LlmNode {
            id: spec.id.clone(),
            config: parse_config(spec)?,
            llm: self.llm.clone(),
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::Llm
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Generate text with a language model".to_string(),
            category: "ai".to_string(),
        }
    }
}
