use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// Declarative workflow graph submitted for execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: NodeSpec) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Adds an unconditional edge.
    pub fn connect(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.edges.push(Edge::new(source, target));
    }

    /// Adds an edge followed only when `source` selects `handle`.
    pub fn connect_handle(
        &mut self,
        source: impl Into<String>,
        handle: impl Into<String>,
        target: impl Into<String>,
    ) {
        self.edges
            .push(Edge::new(source, target).with_source_handle(handle));
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn start_node(&self) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Start)
    }
}

/// Node tag. Unrecognised tags are kept verbatim so the runtime can skip them by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Start,
    End,
    Llm,
    Api,
    Condition,
    Classifier,
    Agent,
    Tool,
    Parallel,
    Other(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            NodeType::Start => "start",
            NodeType::End => "end",
            NodeType::Llm => "llm",
            NodeType::Api => "api",
            NodeType::Condition => "condition",
            NodeType::Classifier => "classifier",
            NodeType::Agent => "agent",
            NodeType::Tool => "tool",
            NodeType::Parallel => "parallel",
            NodeType::Other(s) => s,
        }
    }
}

impl From<String> for NodeType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "start" => NodeType::Start,
            "end" => NodeType::End,
            "llm" => NodeType::Llm,
            "api" => NodeType::Api,
            "condition" => NodeType::Condition,
            "classifier" => NodeType::Classifier,
            "agent" => NodeType::Agent,
            "tool" => NodeType::Tool,
            "parallel" => NodeType::Parallel,
            _ => NodeType::Other(s),
        }
    }
}

impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        NodeType::from(s.to_string())
    }
}

impl From<NodeType> for String {
    fn from(t: NodeType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node specification in a workflow document.
///
/// `data` holds the type-specific configuration; every node carries a
/// `reference_key` there and may carry `timeout` (seconds) and `label`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>, node_type: impl Into<NodeType>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: Map::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_reference_key(self, key: impl Into<String>) -> Self {
        self.with_config("reference_key", key.into())
    }

    pub fn with_label(self, label: impl Into<String>) -> Self {
        self.with_config("label", label.into())
    }

    /// Namespace prefix for this node's outputs. Falls back to the node id.
    pub fn reference_key(&self) -> &str {
        self.data
            .get("reference_key")
            .and_then(Value::as_str)
            .unwrap_or(self.id.as_str())
    }

    pub fn label(&self) -> &str {
        self.data
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or(self.id.as_str())
    }

    /// Per-node timeout override, if configured with a positive number of seconds.
    ///
    /// Values beyond what a `Duration` can hold saturate to `Duration::MAX`.
    pub fn timeout(&self) -> Option<Duration> {
        let secs = match self.data.get("timeout")? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        (secs.is_finite() && secs > 0.0)
            .then(|| Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
    }
}

/// Directed link between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, alias = "source_handle", skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, alias = "target_handle", skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }
}
