use crate::{null_as_default, parse_config};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use waveruntime::{NodeFactory, NodeMetadata};
use wavecore::{ExecutionContext, NodeError, NodeExecutor, NodeOutput, NodeSpec, NodeType};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputType {
    #[default]
    Variable,
    Template,
    Structured,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct OutputField {
    key: String,
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct EndConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    output_type: OutputType,
    #[serde(default)]
    output_variable: Option<String>,
    #[serde(default)]
    output_template: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    output_structure: Vec<OutputField>,
}

/// Produces the run's final output as `{result}`.
pub struct EndNode {
    id: String,
    config: EndConfig,
}

impl EndNode {
    fn result(&self, ctx: &ExecutionContext) -> Value {
        match self.config.output_type {
            OutputType::Variable => self
                .config
                .output_variable
                .as_deref()
                .filter(|path| !path.is_empty())
                .and_then(|path| ctx.get(path))
                .cloned()
                .unwrap_or(Value::Null),
            OutputType::Template => Value::String(
                ctx.resolve_template(self.config.output_template.as_deref().unwrap_or_default()),
            ),
            OutputType::Structured => Value::Object(
                self.config
                    .output_structure
                    .iter()
                    .map(|field| (field.key.clone(), ctx.resolve_deep(&field.value)))
                    .collect::<Map<_, _>>(),
            ),
            OutputType::Unknown => {
                tracing::warn!("End node {} has an unknown output_type", self.id);
                Value::Null
            }
        }
    }
}

#[async_trait]
impl NodeExecutor for EndNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::End
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::new().with_output("result", self.result(ctx)))
    }
}

pub struct EndNodeFactory;

impl NodeFactory for EndNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(EndNode {
            id: spec.id.clone(),
            config: parse_config(spec)?,
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::End
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Terminal node producing the workflow result".to_string(),
            category: "flow".to_string(),
        }
    }
}
