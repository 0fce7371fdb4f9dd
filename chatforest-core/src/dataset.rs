use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ChatforestError, Result};
use crate::forest::{ForestBuilder, Graph};
use crate::index::RowIndex;
use crate::ingest::load_rows_csv;
use crate::model::{Node, NodeRole, Row};
use crate::thread::{Thread, ancestor_thread, conversation_thread};

/// One uploaded chat export: the validated rows and the forest built from them.
///
/// A dataset is never mutated. Loading another export produces a new value
/// that replaces the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    source: Option<PathBuf>,
    rows: Vec<Row>,
    graph: Graph,
    dropped_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDetail<'d> {
    pub node: &'d Node,
    pub parent: Option<&'d Node>,
    pub child_count: usize,
}

impl Dataset {
    pub fn from_rows(rows: Vec<Row>) -> Result<Self> {
        Self::build(rows, None, 0)
    }

    pub fn load_csv(path: &Path) -> Result<Self> {
        let report = load_rows_csv(path)?;
        Self::build(report.rows, Some(path.to_path_buf()), report.dropped)
    }

    fn build(rows: Vec<Row>, source: Option<PathBuf>, dropped_rows: usize) -> Result<Self> {
        if rows.is_empty() {
            return Err(ChatforestError::NoValidRows {
                path: source.unwrap_or_default(),
            });
        }

        let index = RowIndex::build(&rows);
        let graph = ForestBuilder::new(&index).build(&rows);
        info!(
            rows = rows.len(),
            nodes = graph.nodes().len(),
            "dataset ready"
        );

        Ok(Self {
            source,
            rows,
            graph,
            dropped_rows,
        })
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn node(&self, node_id: &str) -> Result<&Node> {
        self.graph
            .node(node_id)
            .ok_or_else(|| ChatforestError::NodeNotFound(node_id.to_string()))
    }

    pub fn node_detail(&self, node_id: &str) -> Result<NodeDetail<'_>> {
        Ok(NodeDetail {
            node: self.node(node_id)?,
            parent: self.graph.parent(node_id),
            child_count: self.graph.child_count(node_id),
        })
    }

    /// Dialogue leading to `node_id`, read off the forest.
    pub fn thread(&self, node_id: &str) -> Result<Thread> {
        ancestor_thread(&self.graph, node_id)
            .ok_or_else(|| ChatforestError::NodeNotFound(node_id.to_string()))
    }

    /// Full dialogue of one conversation, replayed from the rows.
    pub fn conversation(&self, conversation_id: &str) -> Result<Thread> {
        if !self
            .rows
            .iter()
            .any(|row| row.conversation_id == conversation_id)
        {
            return Err(ChatforestError::ConversationNotFound(
                conversation_id.to_string(),
            ));
        }
        Ok(conversation_thread(&self.rows, conversation_id))
    }

    /// Text to summarize for a selected node: its thread for user/assistant
    /// messages, the whole conversation for a conversation root.
    pub fn summary_input(&self, node_id: &str) -> Result<String> {
        let node = self.node(node_id)?;
        let thread = match node.role {
            NodeRole::User | NodeRole::Assistant => self.thread(node_id)?,
            NodeRole::ConversationRoot => {
                let conversation_id = node.conversation_id.as_deref().ok_or_else(|| {
                    ChatforestError::ConversationNotFound(node_id.to_string())
                })?;
                self.conversation(conversation_id)?
            }
            NodeRole::System | NodeRole::Tool | NodeRole::CentralRoot => {
                return Err(ChatforestError::InvalidMode(format!(
                    "no summary available for {} node {node_id}",
                    node.role
                )));
            }
        };
        Ok(thread.render_text())
    }
}
