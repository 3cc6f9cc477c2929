//! Standard node library
//!
//! Built-in executors for every workflow node type the engine runs, plus the
//! restricted expression evaluator and a reqwest-backed HTTP capability.

mod agent;
mod api;
mod classifier;
mod condition;
mod end;
pub mod expression;
mod http;
mod llm;
mod start;
mod tool;

pub use agent::{AgentNode, AgentNodeFactory};
pub use api::{ApiNode, ApiNodeFactory};
pub use classifier::{ClassifierNode, ClassifierNodeFactory};
pub use condition::{ConditionNode, ConditionNodeFactory};
pub use end::{EndNode, EndNodeFactory};
pub use http::ReqwestHttpClient;
pub use llm::{LlmNode, LlmNodeFactory};
pub use start::{StartNode, StartNodeFactory};
pub use tool::{ToolNode, ToolNodeFactory};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use wavecore::{Capabilities, NodeError, NodeSpec};
use waveruntime::NodeRegistry;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut NodeRegistry, capabilities: &Capabilities) {
    registry.register(Arc::new(start::StartNodeFactory));
    registry.register(Arc::new(end::EndNodeFactory));
    registry.register(Arc::new(llm::LlmNodeFactory::new(capabilities.llm.clone())));
    registry.register(Arc::new(api::ApiNodeFactory::new(capabilities.http.clone())));
    registry.register(Arc::new(condition::ConditionNodeFactory::new(capabilities.llm.clone())));
    registry.register(Arc::new(classifier::ClassifierNodeFactory::new(capabilities.llm.clone())));
    registry.register(Arc::new(agent::AgentNodeFactory::new(capabilities.agents.clone())));
    registry.register(Arc::new(tool::ToolNodeFactory::new(capabilities.tools.clone())));
}

/// Registry holding every standard node, wired to `capabilities`.
pub fn standard_registry(capabilities: &Capabilities) -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    register_all(&mut registry, capabilities);
    registry
}

/// Deserializes a node's `data` into its typed configuration.
pub(crate) fn parse_config<T: DeserializeOwned>(spec: &NodeSpec) -> Result<T, NodeError> {
    serde_json::from_value(Value::Object(spec.data.clone())).map_err(|e| {
        NodeError::Configuration(format!("invalid config for node {}: {}", spec.id, e))
    })
}

/// Treats an explicit `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{key, value}` pair as used by headers, params and form bodies.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}
