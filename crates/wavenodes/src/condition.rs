use crate::expression::{self, truthy};
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

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ConditionType {
    #[default]
    Variable,
    Expression,
    Llm,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Operator {
    #[default]
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct ConditionConfig {
    #[serde(default, deserialize_with = "null_as_default")]
    condition_type: ConditionType,
    #[serde(default)]
    variable: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    operator: Operator,
    #[serde(default)]
    compare_value: Value,
    #[serde(default)]
    expression: Option<String>,
    #[serde(default)]
    llm_prompt: Option<String>,
    #[serde(flatten)]
    model: ModelChoice,
}

/// Two-way branch; emits `{result}` and selects handle `"true"` or `"false"`.
pub struct ConditionNode {
    id: String,
    config: ConditionConfig,
    llm: Arc<dyn LlmClient>,
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn to_number(value: &Value, field: &str) -> Result<f64, NodeError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    parsed.ok_or_else(|| NodeError::InvalidInputType {
        field: field.to_string(),
        expected: "number".to_string(),
        actual: match value {
            Value::String(s) => format!("string '{}'", s),
            other => type_name(other).to_string(),
        },
    })
}

impl ConditionNode {
    fn compare_variable(&self, ctx: &ExecutionContext) -> Result<bool, NodeError> {
        let path = self.config.variable.as_deref().unwrap_or_default();
        let actual = ctx.get(path).cloned().unwrap_or(Value::Null);
        let expected = ctx.resolve_deep(&self.config.compare_value);

        Ok(match self.config.operator {
            Operator::Equals => display_value(&actual) == display_value(&expected),
            Operator::NotEquals => display_value(&actual) != display_value(&expected),
            Operator::Contains => display_value(&actual).contains(&display_value(&expected)),
            Operator::GreaterThan => {
                to_number(&actual, "variable")? > to_number(&expected, "compare_value")?
            }
            Operator::LessThan => {
                to_number(&actual, "variable")? < to_number(&expected, "compare_value")?
            }
            Operator::IsEmpty => !truthy(&actual),
            Operator::IsNotEmpty => truthy(&actual),
            Operator::Unknown => {
                tracing::warn!("Condition node {} has an unknown operator", self.id);
                false
            }
        })
    }

    fn evaluate_expression(&self, ctx: &ExecutionContext) -> bool {
        let source = ctx.resolve_template(self.config.expression.as_deref().unwrap_or_default());
        match expression::evaluate(&source, &ctx.namespaces()) {
            Ok(value) => truthy(&value),
            Err(e) => {
                tracing::warn!("Error evaluating expression '{}': {}", source, e);
                false
            }
        }
    }

    async fn ask_llm(&self, ctx: &ExecutionContext) -> Result<bool, NodeError> {
        let prompt = format!(
            "Given the context, determine if this condition is true: {}. Return only 'true' or 'false'.",
            self.config.llm_prompt.as_deref().unwrap_or_default()
        );
        let request = self.config.model.request(ctx.resolve_template(&prompt));
        let reply = self.llm.complete(request).await?;
        Ok(reply.to_lowercase().contains("true"))
    }
}

#[async_trait]
impl NodeExecutor for ConditionNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Condition
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let result = match self.config.condition_type {
            ConditionType::Variable => self.compare_variable(ctx)?,
            ConditionType::Expression => self.evaluate_expression(ctx),
            ConditionType::Llm => self.ask_llm(ctx).await?,
            ConditionType::Unknown => {
                tracing::warn!("Condition node {} has an unknown condition_type", self.id);
                false
            }
        };
        tracing::debug!("Condition node {} evaluated to {}", self.id, result);

        Ok(NodeOutput::new()
            .with_output("result", result)
            .with_handle(if result { "true" } else { "false" }))
    }
}

pub struct ConditionNodeFactory {
    llm: Arc<dyn LlmClient>,
}

impl ConditionNodeFactory {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

impl NodeFactory for ConditionNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(ConditionNode {
            id: spec.id.clone(),
            config: parse_config(spec)?,
            llm: self.llm.clone(),
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::Condition
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Branch on a variable comparison, an expression or an LLM judgement"
                .to_string(),
            category: "logic".to_string(),
        }
    }
}
