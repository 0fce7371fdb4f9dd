use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::index::RowIndex;
use crate::model::{CENTRAL_ROOT_ID, Edge, Node, NodeRole, Row};

/// Message forest converging on the central root.
///
/// Built once per dataset and never mutated afterwards. Node and parent
/// lookups follow the index: when ids repeat, the last one wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    #[serde(skip)]
    node_positions: HashMap<String, usize>,
    #[serde(skip)]
    parents: HashMap<String, String>,
    #[serde(skip)]
    child_counts: HashMap<String, usize>,
}

impl Graph {
    fn with_central_root(capacity: usize) -> Self {
        let mut graph = Self {
            nodes: Vec::with_capacity(capacity),
            edges: Vec::with_capacity(capacity),
            node_positions: HashMap::with_capacity(capacity),
            parents: HashMap::with_capacity(capacity),
            child_counts: HashMap::new(),
        };
        graph.push_node(Node::central_root());
        graph
    }

    fn push_node(&mut self, node: Node) {
        self.node_positions.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    fn push_edge(&mut self, edge: Edge) {
        *self.child_counts.entry(edge.target.clone()).or_default() += 1;
        self.parents.insert(edge.source.clone(), edge.target.clone());
        self.edges.push(edge);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_positions
            .get(id)
            .and_then(|position| self.nodes.get(*position))
    }

    pub fn central_root(&self) -> Option<&Node> {
        self.node(CENTRAL_ROOT_ID)
    }

    pub fn parent_id(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    pub fn parent(&self, id: &str) -> Option<&Node> {
        self.parent_id(id).and_then(|parent_id| self.node(parent_id))
    }

    pub fn child_count(&self, id: &str) -> usize {
        self.child_counts.get(id).copied().unwrap_or_default()
    }

    pub fn conversation_roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|node| node.role == NodeRole::ConversationRoot)
    }

    pub fn message_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.role.message_role().is_some())
            .count()
    }
}

/// Builds the message forest from rows and their index.
pub struct ForestBuilder<'i, 'a> {
    index: &'i RowIndex<'a>,
    /// Message-to-message links kept so far, child id to parent id.
    kept_links: HashMap<&'a str, &'a str>,
}

impl<'i, 'a> ForestBuilder<'i, 'a> {
    pub fn new(index: &'i RowIndex<'a>) -> Self {
        Self {
            index,
            kept_links: HashMap::new(),
        }
    }

    /// Emits the central root, then one node per row, then parent edges and
    /// conversation roots in row order.
    pub fn build(mut self, rows: &'a [Row]) -> Graph {
        let mut graph = Graph::with_central_root(rows.len() + 1);

        for row in rows {
            graph.push_node(Node::message(row));
        }

        let mut conversation_roots = HashMap::<&str, String>::new();
        for row in rows {
            if let Some(parent) = self.resolve_parent(row) {
                self.kept_links.insert(row.id.as_str(), parent.id.as_str());
                graph.push_edge(Edge::new(&row.id, &parent.id));
                continue;
            }
            self.kept_links.remove(row.id.as_str());

            let conversation_id = row.conversation_id.as_str();
            let root_id = match conversation_roots.get(conversation_id) {
                Some(root_id) => root_id.clone(),
                None => {
                    let root = Node::conversation_root(
                        conversation_id,
                        self.index.first_message(conversation_id),
                    );
                    let root_id = root.id.clone();
                    graph.push_node(root);
                    graph.push_edge(Edge::new(&root_id, CENTRAL_ROOT_ID));
                    conversation_roots.insert(conversation_id, root_id.clone());
                    root_id
                }
            };
            graph.push_edge(Edge::new(&row.id, root_id));
        }

        info!(
            messages = rows.len(),
            conversations = conversation_roots.len(),
            "built message forest"
        );
        graph
    }

    fn resolve_parent(&self, row: &Row) -> Option<&'a Row> {
        let parent = self.index.parent_of(row)?;
        if self.closes_cycle(&row.id, &parent.id) {
            debug!(
                row_id = %row.id,
                parent_id = %parent.id,
                "parent chain loops back to row, attaching to conversation root"
            );
            return None;
        }
        Some(parent)
    }

    /// Follows the links kept so far from `parent_id` and reports whether
    /// they lead back to `child_id`.
    fn closes_cycle(&self, child_id: &str, parent_id: &str) -> bool {
        let mut visited = HashSet::new();
        let mut current = parent_id;

        loop {
            if current == child_id {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            match self.kept_links.get(current) {
                Some(&next) => current = next,
                None => return false,
            }
        }
    }
}

pub fn build_forest(rows: &[Row]) -> Graph {
    let index = RowIndex::build(rows);
    ForestBuilder::new(&index).build(rows)
}
