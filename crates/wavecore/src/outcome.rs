use crate::NodeType;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type RunId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Completed,
    Failed,
}

/// Result of one node attempt, reported to the caller once per attempted node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOutcome {
    pub run_id: RunId,
    pub node_id: String,
    pub node_type: NodeType,
    pub status: NodeStatus,
    /// Node configuration with templates resolved against the context at attempt time.
    pub input: Value,
    pub output: Map<String, Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Caller-supplied per-node completion hook.
///
/// Awaited inside the run, in execution order, before the next node starts.
#[async_trait]
pub trait NodeCompletionHandler: Send + Sync {
    async fn on_node_complete(&self, outcome: &NodeOutcome);
}

#[async_trait]
impl<F> NodeCompletionHandler for F
where
    F: Fn(&NodeOutcome) + Send + Sync,
{
    async fn on_node_complete(&self, outcome: &NodeOutcome) {
        self(outcome)
    }
}
