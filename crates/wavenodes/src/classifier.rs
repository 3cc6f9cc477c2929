use crate::llm::ModelChoice;
use crate::{null_as_default, parse_config};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use waveruntime::{NodeFactory, NodeMetadata};
use wavecore::{
    display_value, ExecutionContext, LlmClient, NodeError, NodeExecutor, NodeOutput, NodeSpec,
    NodeType,
};

#[derive(Debug, Clone, Deserialize)]
struct Category {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ClassifierConfig {
    #[serde(default)]
    input_variable: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    categories: Vec<Category>,
    #[serde(flatten)]
    model: ModelChoice,
}

/// Routes to one of its categories; the handle is the chosen category id.
///
/// Unusable model replies fall back to the first category.
pub struct ClassifierNode {
    id: String,
    config: ClassifierConfig,
    llm: Arc<dyn LlmClient>,
}

/// First JSON object embedded in free text.
fn first_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(Value::is_object)
    })
}

impl ClassifierNode {
    fn prompt(&self, input: &str) -> String {
        let categories = self
            .config
            .categories
            .iter()
            .map(|c| format!("- {}: {} ({})", c.id, c.name, c.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "\nClassify the following input into one of these categories:\n{}\n\nInput: {}\n\nReturn the category ID in JSON format: {{\"category_id\": \"...\"}}\n",
            categories, input
        )
    }

    fn pick(&self, reply: &str) -> Option<&Category> {
        let chosen = first_json_object(reply)
            .and_then(|json| json.get("category_id").map(display_value))
            .and_then(|id| self.config.categories.iter().find(|c| c.id == id));
        if chosen.is_none() {
            tracing::warn!(
                "Classifier node {} could not match a category in the reply, using the first",
                self.id
            );
        }
        chosen.or_else(|| self.config.categories.first())
    }
}

#[async_trait]
impl NodeExecutor for ClassifierNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Classifier
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        if self.config.categories.is_empty() {
            return Ok(NodeOutput::new()
                .with_output("category_id", Value::Null)
                .with_output("category_name", Value::Null));
        }

        let input = ctx.resolve_template(self.config.input_variable.as_deref().unwrap_or_default());
        let reply = self.llm.complete(self.config.model.request(self.prompt(&input))).await?;

        match self.pick(&reply) {
            Some(category) => Ok(NodeOutput::new()
                .with_output("category_id", category.id.clone())
                .with_output("category_name", category.name.clone())
                .with_handle(category.id.clone())),
            None => Err(NodeError::ExecutionFailed("classifier has no categories".to_string())),
        }
    }
}

pub struct ClassifierNodeFactory {
    llm: Arc<dyn LlmClient>,
}

impl ClassifierNodeFactory {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

impl NodeFactory for ClassifierNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(ClassifierNode {
            id: spec.id.clone(),
            config: parse_config(spec)?,
            llm: self.llm.clone(),
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::Classifier
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Classify input into a category with a language model".to_string(),
            category: "ai".to_string(),
        }
    }
}
