use crate::{null_as_default, parse_config};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use waveruntime::{NodeFactory, NodeMetadata};
use wavecore::{ExecutionContext, NodeError, NodeExecutor, NodeOutput, NodeSpec, NodeType, ToolService};

#[derive(Debug, Deserialize)]
struct ToolConfig {
    tool_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    config: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    input_mapping: Map<String, Value>,
}

/// Invokes a registered tool; emits `{result}`.
pub struct ToolNode {
    id: String,
    config: ToolConfig,
    tools: Arc<dyn ToolService>,
}

fn resolve_map(ctx: &ExecutionContext, map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(name, value)| (name.clone(), ctx.resolve_deep(value)))
        .collect()
}

#[async_trait]
impl NodeExecutor for ToolNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Tool
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let result = self
            .tools
            .invoke(
                &self.config.tool_id,
                resolve_map(ctx, &self.config.config),
                resolve_map(ctx, &self.config.input_mapping),
            )
            .await?;
        Ok(NodeOutput::new().with_output("result", result))
    }
}

pub struct ToolNodeFactory {
    tools: Arc<dyn ToolService>,
}

impl ToolNodeFactory {
    pub fn new(tools: Arc<dyn ToolService>) -> Self {
        Self { tools }
    }
}

impl NodeFactory for ToolNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(ToolNode {
            id: spec.id.clone(),
            config: parse_config(spec)?,
            tools: self.tools.clone(),
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::Tool
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Invoke an external tool".to_string(),
            category: "integration".to_string(),
        }
    }
}
