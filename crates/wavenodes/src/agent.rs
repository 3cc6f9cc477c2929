use crate::{null_as_default, parse_config};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use waveruntime::{NodeFactory, NodeMetadata};
use wavecore::{
    AgentService, ExecutionContext, NodeError, NodeExecutor, NodeOutput, NodeSpec, NodeType,
};

#[derive(Debug, Deserialize)]
struct AgentConfig {
    agent_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    input_mapping: Map<String, Value>,
}

/// Delegates to the agent service; emits `{text}`.
pub struct AgentNode {
    id: String,
    config: AgentConfig,
    agents: Arc<dyn AgentService>,
}

#[async_trait]
impl NodeExecutor for AgentNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Agent
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let inputs = self
            .config
            .input_mapping
            .iter()
            .map(|(name, template)| (name.clone(), ctx.resolve_deep(template)))
            .collect();
        let text = self.agents.run(&self.config.agent_id, inputs).await?;
        Ok(NodeOutput::new().with_output("text", text))
    }
}

pub struct AgentNodeFactory {
    agents: Arc<dyn AgentService>,
}

impl AgentNodeFactory {
    pub fn new(agents: Arc<dyn AgentService>) -> Self {
        Self { agents }
    }
}

impl NodeFactory for AgentNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(AgentNode {
            id: spec.id.clone(),
            config: parse_config(spec)?,
            agents: self.agents.clone(),
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::Agent
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Run a configured agent".to_string(),
            category: "ai".to_string(),
        }
    }
}
