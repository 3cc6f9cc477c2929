use crate::{null_as_default, parse_config};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use waveruntime::{NodeFactory, NodeMetadata};
use wavecore::{ExecutionContext, NodeError, NodeExecutor, NodeOutput, NodeSpec, NodeType};

#[derive(Debug, Deserialize)]
struct StartConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    input_variables: Vec<InputVariable>,
}

#[derive(Debug, Deserialize)]
struct InputVariable {
    name: String,
}

/// Re-emits the declared run inputs, which the orchestrator has already
/// seeded under this node's reference key.
pub struct StartNode {
    id: String,
    reference_key: String,
    inputs: Vec<String>,
}

#[async_trait]
impl NodeExecutor for StartNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Start
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let mut output = NodeOutput::new();
        for name in &self.inputs {
            let path = format!("{}.{}", self.reference_key, name);
            let value = ctx.get(&path).cloned().unwrap_or(Value::Null);
            output = output.with_output(name.clone(), value);
        }
        Ok(output)
    }
}

pub struct StartNodeFactory;

impl NodeFactory for StartNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        let config: StartConfig = parse_config(spec)?;
        Ok(Box::new(StartNode {
            id: spec.id.clone(),
            reference_key: spec.reference_key().to_string(),
            inputs: config.input_variables.into_iter().map(|v| v.name).collect(),
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::Start
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Entry point exposing the run inputs".to_string(),
            category: "flow".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn emits_declared_inputs_only() {
        let spec = NodeSpec::new("start", NodeType::Start)
            .with_reference_key("start")
            .with_config(
                "input_variables",
                json!([{"name": "text", "type": "string"}, {"name": "lang"}]),
            );
        let mut ctx = ExecutionContext::new();
        ctx.set("start", "text", json!("hello"));
        ctx.set("start", "undeclared", json!(1));

        let node = StartNodeFactory.create(&spec).unwrap();
        let output = node.execute(&ctx).await.unwrap();

        assert_eq!(output.get("text"), Some(&json!("hello")));
        assert_eq!(output.get("lang"), Some(&Value::Null));
        assert_eq!(output.outputs.len(), 2);
        assert_eq!(output.handle, None);
    }

    #[test]
    fn rejects_malformed_variables() {
        let spec = NodeSpec::new("start", NodeType::Start)
            .with_config("input_variables", json!([{"type": "string"}]));
        let err = StartNodeFactory.create(&spec).err().unwrap();
        assert!(matches!(err, NodeError::Configuration(_)));
    }
}
