//! Static checks a workflow document must pass before it may run.

use crate::graph::WorkflowGraph;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use wavecore::{NodeType, WorkflowDocument};

/// Returns every structural problem found in `document`, as human-readable
/// messages. An empty list means the document is valid.
pub fn validate(document: &WorkflowDocument) -> Vec<String> {
    let mut errors = Vec::new();

    let start_nodes: Vec<_> = document
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Start)
        .collect();
    match start_nodes.len() {
        0 => errors.push("Workflow must have a start node".to_string()),
        1 => {}
        _ => errors.push("Workflow cannot have more than one start node".to_string()),
    }

    let end_ids: Vec<&str> = document
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::End)
        .map(|n| n.id.as_str())
        .collect();
    if end_ids.is_empty() {
        errors.push("Workflow must have at least one end node".to_string());
    }

    let Some(start) = start_nodes.first() else {
        return errors;
    };

    errors.extend(check_identity(document));

    let graph = WorkflowGraph::new(document);
    for edge in graph.dangling_edges() {
        errors.push(format!(
            "Edge references non-existent node: {} -> {}",
            edge.source, edge.target
        ));
    }

    let from_start = graph.reachable_from([start.id.as_str()], Direction::Outgoing);
    for node in &document.nodes {
        if !from_start.contains(node.id.as_str()) {
            errors.push(format!("Node '{}' is not reachable from start", node.label()));
        }
    }

    let to_end = graph.reachable_from(end_ids, Direction::Incoming);
    for node in &document.nodes {
        if !to_end.contains(node.id.as_str()) {
            errors.push(format!("Node '{}' cannot reach any end node", node.label()));
        }
    }

    if graph.topological_order().len() < graph.node_count() {
        errors.push("Workflow contains circular dependencies".to_string());
    }

    for node in document.nodes.iter().filter(|n| n.node_type == NodeType::Parallel) {
        errors.push(format!(
            "Node '{}' uses the parallel node type, which the engine cannot execute",
            node.label()
        ));
    }

    errors
}

/// Node ids and reference keys must both be unique.
fn check_identity(document: &WorkflowDocument) -> Vec<String> {
    let mut errors = Vec::new();

    let mut seen_ids = HashSet::new();
    for node in &document.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            errors.push(format!("Duplicate node id: {}", node.id));
        }
    }

    let mut owners: HashMap<&str, &str> = HashMap::new();
    for node in &document.nodes {
        let key = node.reference_key();
        match owners.get(key) {
            Some(first) if *first != node.id.as_str() => errors.push(format!(
                "Reference key '{}' is used by both '{}' and '{}'",
                key,
                first,
                node.id
            )),
            Some(_) => {}
            None => {
                owners.insert(key, node.id.as_str());
            }
        }
    }

    errors
}
