use std::collections::HashMap;
use std::sync::Arc;
use wavecore::{NodeError, NodeExecutor, NodeSpec, NodeType};

/// Factory trait for creating node executors
pub trait NodeFactory: Send + Sync {
    /// Create a fresh executor for one node of one run
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError>;

    /// Node type this factory handles
    fn node_type(&self) -> NodeType;

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Metadata about a node type
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
        }
    }
}

/// Node type → factory map.
///
/// Built once while the engine is assembled, then shared read-only behind an `Arc`.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: HashMap<NodeType, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node factory, replacing any earlier one for the same type
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type();
        tracing::info!("Registering node type: {}", node_type);
        self.factories.insert(node_type, factory);
    }

    pub fn contains(&self, node_type: &NodeType) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Create an executor for `spec`, or `None` when its type is not registered
    pub fn create(&self, spec: &NodeSpec) -> Option<Result<Box<dyn NodeExecutor>, NodeError>> {
        self.factories
            .get(&spec.node_type)
            .map(|factory| factory.create(spec))
    }

    /// Registered node types, sorted by name
    pub fn list_node_types(&self) -> Vec<NodeType> {
        let mut types: Vec<_> = self.factories.keys().cloned().collect();
        types.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        types
    }

    pub fn get_metadata(&self, node_type: &NodeType) -> Option<NodeMetadata> {
        self.factories.get(node_type).map(|f| f.metadata())
    }
}
