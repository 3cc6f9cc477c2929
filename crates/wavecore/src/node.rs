use crate::{ExecutionContext, NodeError, NodeType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Core trait that every node type implements.
///
/// One executor instance is created per node per run, so implementations
/// carry only their parsed configuration and injected services.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Id of the node this instance was created for.
    fn node_id(&self) -> &str;

    fn node_type(&self) -> NodeType;

    /// Execute the node against the run's variable store.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError>;

    /// Races [`execute`](Self::execute) against `timeout`.
    ///
    /// Expiry yields [`NodeError::Timeout`] carrying the configured seconds.
    async fn execute_with_timeout(
        &self,
        ctx: &ExecutionContext,
        timeout: Duration,
    ) -> Result<NodeOutput, NodeError> {
        match tokio::time::timeout(timeout, self.execute(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout {
                node_id: self.node_id().to_string(),
                seconds: timeout.as_secs_f64(),
            }),
        }
    }
}

/// Output from node execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// Values merged into the context under the node's reference key.
    pub outputs: Map<String, Value>,

    /// Branch selector; `None` follows every outgoing edge.
    pub handle: Option<String>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Sleepy {
        delay: Duration,
    }

    #[async_trait]
    impl NodeExecutor for Sleepy {
        fn node_id(&self) -> &str {
            "sleepy"
        }

        fn node_type(&self) -> NodeType {
            NodeType::Other("sleepy".into())
        }

        async fn execute(&self, _ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
            tokio::time::sleep(self.delay).await;
            Ok(NodeOutput::new().with_output("done", true))
        }
    }

    #[tokio::test]
    async fn finishes_inside_deadline() {
        let node = Sleepy { delay: Duration::from_millis(5) };
        let output = node
            .execute_with_timeout(&ExecutionContext::new(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output.get("done"), Some(&json!(true)));
        assert_eq!(output.handle, None);
    }

    #[tokio::test]
    async fn expiry_reports_configured_timeout() {
        let node = Sleepy { delay: Duration::from_secs(5) };
        let err = node
            .execute_with_timeout(&ExecutionContext::new(), Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Node sleepy execution timed out after 0.02s");
    }
}
