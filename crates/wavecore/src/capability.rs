//! External services the node executors call through.
//!
//! The engine never talks to a provider directly; concrete clients are
//! injected when the node registry is built.

use crate::CapabilityError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Parameters of one chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub provider: String,
    pub model: String,
    pub user_prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub const DEFAULT_PROVIDER: &'static str = "openai";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";
    pub const DEFAULT_TEMPERATURE: f64 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 2000;

    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            user_prompt: user_prompt.into(),
            system_prompt: None,
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the completion text. Provider failures map to [`CapabilityError::Llm`].
    async fn complete(&self, request: CompletionRequest) -> Result<String, CapabilityError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HttpBody {
    None,
    Json(Value),
    Form(Vec<(String, String)>),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub body: HttpBody,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: Map<String, Value>,
    pub body: String,
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, CapabilityError>;
}

/// Runs a configured agent and returns its reply text.
#[async_trait]
pub trait AgentService: Send + Sync {
    async fn run(&self, agent_id: &str, inputs: Map<String, Value>) -> Result<String, CapabilityError>;
}

/// Invokes a registered tool.
#[async_trait]
pub trait ToolService: Send + Sync {
    async fn invoke(
        &self,
        tool_id: &str,
        config: Map<String, Value>,
        inputs: Map<String, Value>,
    ) -> Result<Value, CapabilityError>;
}

/// Bundle of injected services handed to the node factories.
#[derive(Clone)]
pub struct Capabilities {
    pub llm: Arc<dyn LlmClient>,
    pub http: Arc<dyn HttpClient>,
    pub agents: Arc<dyn AgentService>,
    pub tools: Arc<dyn ToolService>,
}

impl Capabilities {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        http: Arc<dyn HttpClient>,
        agents: Arc<dyn AgentService>,
        tools: Arc<dyn ToolService>,
    ) -> Self {
        Self {
            llm,
            http,
            agents,
            tools,
        }
    }

    /// Every service fails with [`CapabilityError::NotConfigured`].
    pub fn unconfigured() -> Self {
        let missing = Arc::new(Unconfigured);
        Self {
            llm: missing.clone(),
            http: missing.clone(),
            agents: missing.clone(),
            tools: missing,
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.http = http;
        self
    }

    pub fn with_agents(mut self, agents: Arc<dyn AgentService>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolService>) -> Self {
        self.tools = tools;
        self
    }
}

struct Unconfigured;

#[async_trait]
impl LlmClient for Unconfigured {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CapabilityError> {
        Err(CapabilityError::NotConfigured(format!(
            "no LLM client for provider '{}'",
            request.provider
        )))
    }
}

#[async_trait]
impl HttpClient for Unconfigured {
    async fn call(&self, _request: HttpRequest) -> Result<HttpResponse, CapabilityError> {
        Err(CapabilityError::NotConfigured("no HTTP client".to_string()))
    }
}

#[async_trait]
impl AgentService for Unconfigured {
    async fn run(&self, agent_id: &str, _inputs: Map<String, Value>) -> Result<String, CapabilityError> {
        Err(CapabilityError::NotConfigured(format!("no agent service for '{}'", agent_id)))
    }
}

#[async_trait]
impl ToolService for Unconfigured {
    async fn invoke(
        &self,
        tool_id: &str,
        _config: Map<String, Value>,
        _inputs: Map<String, Value>,
    ) -> Result<Value, CapabilityError> {
        Err(CapabilityError::NotConfigured(format!("no tool service for '{}'", tool_id)))
    }
}
