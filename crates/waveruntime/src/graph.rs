use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use wavecore::{Edge, NodeSpec, WorkflowDocument};

/// Adjacency view over a workflow document.
///
/// Edges whose endpoints are unknown are dropped at construction and kept
/// aside in [`dangling_edges`](Self::dangling_edges) for validation to report.
pub struct WorkflowGraph<'a> {
    graph: DiGraph<&'a str, Option<&'a str>>,
    index: HashMap<&'a str, NodeIndex>,
    nodes: HashMap<&'a str, &'a NodeSpec>,
    dangling: Vec<&'a Edge>,
}

impl<'a> WorkflowGraph<'a> {
    pub fn new(document: &'a WorkflowDocument) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut nodes = HashMap::new();

        for node in &document.nodes {
            // First declaration wins; duplicates are a validation error.
            if index.contains_key(node.id.as_str()) {
                continue;
            }
            let idx = graph.add_node(node.id.as_str());
            index.insert(node.id.as_str(), idx);
            nodes.insert(node.id.as_str(), node);
        }

        let mut dangling = Vec::new();
        for edge in &document.edges {
            match (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
                (Some(&from), Some(&to)) => {
                    graph.add_edge(from, to, edge.source_handle.as_deref());
                }
                _ => dangling.push(edge),
            }
        }

        Self {
            graph,
            index,
            nodes,
            dangling,
        }
    }

    pub fn node(&self, id: &str) -> Option<&'a NodeSpec> {
        self.nodes.get(id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn dangling_edges(&self) -> &[&'a Edge] {
        &self.dangling
    }

    /// Kahn's algorithm with a FIFO queue, seeded in document order.
    ///
    /// Nodes on a cycle never reach in-degree zero and are left out, so a
    /// result shorter than [`node_count`](Self::node_count) means the graph is cyclic.
    pub fn topological_order(&self) -> Vec<&'a str> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| (idx, self.graph.edges_directed(idx, Direction::Incoming).count()))
            .collect();

        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| in_degree[idx] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(current) = queue.pop_front() {
            order.push(self.graph[current]);
            for edge in self.ordered_edges(current, Direction::Outgoing) {
                let target = self.graph.raw_edges()[edge.index()].target();
                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(target);
                    }
                }
            }
        }
        order
    }

    /// Successors of `id`. With a handle, only edges tagged with that
    /// `source_handle`; without one, every outgoing edge.
    pub fn next_nodes(&self, id: &str, handle: Option<&str>) -> Vec<&'a str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.ordered_edges(idx, Direction::Outgoing)
            .into_iter()
            .filter_map(|edge| {
                let raw = &self.graph.raw_edges()[edge.index()];
                match handle {
                    Some(wanted) if raw.weight != Some(wanted) => None,
                    _ => Some(self.graph[raw.target()]),
                }
            })
            .collect()
    }

    /// Direct predecessors of `id`, in edge declaration order.
    pub fn previous_nodes(&self, id: &str) -> Vec<&'a str> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        self.ordered_edges(idx, Direction::Incoming)
            .into_iter()
            .map(|edge| self.graph[self.graph.raw_edges()[edge.index()].source()])
            .collect()
    }

    /// Breadth-first walk from `roots`, forward along edges or backward against them.
    pub fn reachable_from<I>(&self, roots: I, direction: Direction) -> HashSet<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = roots
            .into_iter()
            .filter_map(|id| self.index.get(id).copied())
            .collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(self.graph[current]) {
                continue;
            }
            queue.extend(self.graph.neighbors_directed(current, direction));
        }
        visited
    }

    // petgraph walks adjacency newest-first; sort back into declaration order.
    fn ordered_edges(&self, idx: NodeIndex, direction: Direction) -> Vec<EdgeIndex> {
        let mut edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| edge.id())
            .collect();
        edges.sort();
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavecore::NodeType;

    fn document(nodes: &[(&str, NodeType)], edges: &[(&str, &str, Option<&str>)]) -> WorkflowDocument {
        let mut doc = WorkflowDocument::new();
        for (id, node_type) in nodes {
            doc.add_node(NodeSpec::new(*id, node_type.clone()));
        }
        for (source, target, handle) in edges {
            match handle {
                Some(h) => doc.connect_handle(*source, *h, *target),
                None => doc.connect(*source, *target),
            }
        }
        doc
    }

    #[test]
    fn linear_chain_sorts_in_order() {
        let doc = document(
            &[
                ("start", NodeType::Start),
                ("a", NodeType::Llm),
                ("b", NodeType::Api),
                ("end", NodeType::End),
            ],
            &[("a", "b", None), ("start", "a", None), ("b", "end", None)],
        );
        let graph = WorkflowGraph::new(&doc);
        assert_eq!(graph.topological_order(), vec!["start", "a", "b", "end"]);
    }

    #[test]
    fn diamond_uses_fifo_order() {
        let doc = document(
            &[
                ("s", NodeType::Start),
                ("l", NodeType::Llm),
                ("r", NodeType::Llm),
                ("e", NodeType::End),
            ],
            &[
                ("s", "l", None),
                ("s", "r", None),
                ("l", "e", None),
                ("r", "e", None),
            ],
        );
        let graph = WorkflowGraph::new(&doc);
        assert_eq!(graph.topological_order(), vec!["s", "l", "r", "e"]);
        assert_eq!(graph.previous_nodes("e"), vec!["l", "r"]);
    }

    #[test]
    fn next_nodes_filters_by_handle() {
        let doc = document(
            &[
                ("cond", NodeType::Condition),
                ("yes", NodeType::Llm),
                ("no", NodeType::Api),
                ("also_yes", NodeType::End),
            ],
            &[
                ("cond", "yes", Some("true")),
                ("cond", "no", Some("false")),
                ("cond", "also_yes", Some("true")),
            ],
        );
        let graph = WorkflowGraph::new(&doc);

        assert_eq!(graph.next_nodes("cond", Some("true")), vec!["yes", "also_yes"]);
        assert_eq!(graph.next_nodes("cond", Some("false")), vec!["no"]);
        assert_eq!(graph.next_nodes("cond", Some("other")), Vec::<&str>::new());
        assert_eq!(graph.next_nodes("cond", None), vec!["yes", "no", "also_yes"]);
        assert_eq!(graph.next_nodes("unknown", None), Vec::<&str>::new());
    }

    #[test]
    fn unknown_endpoints_are_dropped() {
        let doc = document(
            &[("s", NodeType::Start), ("e", NodeType::End)],
            &[("s", "e", None), ("s", "ghost", None), ("ghost", "e", None)],
        );
        let graph = WorkflowGraph::new(&doc);

        assert_eq!(graph.dangling_edges().len(), 2);
        assert_eq!(graph.next_nodes("s", None), vec!["e"]);
        assert_eq!(graph.topological_order(), vec!["s", "e"]);
    }

    #[test]
    fn cycle_shortens_topological_order() {
        let doc = document(
            &[("a", NodeType::Llm), ("b", NodeType::Llm)],
            &[("a", "b", None), ("b", "a", None)],
        );
        let graph = WorkflowGraph::new(&doc);
        assert!(graph.topological_order().len() < graph.node_count());
    }

    #[test]
    fn reachability_in_both_directions() {
        let doc = document(
            &[
                ("s", NodeType::Start),
                ("a", NodeType::Llm),
                ("e", NodeType::End),
                ("island", NodeType::Llm),
            ],
            &[("s", "a", None), ("a", "e", None)],
        );
        let graph = WorkflowGraph::new(&doc);

        let forward = graph.reachable_from(["s"], Direction::Outgoing);
        assert!(forward.contains("e"));
        assert!(!forward.contains("island"));

        let backward = graph.reachable_from(["e"], Direction::Incoming);
        assert!(backward.contains("s"));
        assert!(!backward.contains("island"));
    }
}
