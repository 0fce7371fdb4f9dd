use std::collections::{BTreeMap, HashSet};

use crate::forest::Graph;
use crate::model::{Node, Role, Row, ThreadMessage};

/// Ordered user/assistant messages, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thread {
    pub messages: Vec<ThreadMessage>,
}

impl Thread {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// `Role: content` lines separated by blank lines.
    pub fn render_text(&self) -> String {
        self.messages
            .iter()
            .map(|message| format!("{}: {}", message.role.title(), message.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Ancestor chain from the earliest non-root ancestor down to `start`.
///
/// Synthetic roots end the walk and are left out. Returns `None` when `start`
/// is not a node of `graph`.
pub fn ancestor_chain<'g>(graph: &'g Graph, start: &str) -> Option<Vec<&'g Node>> {
    let mut chain = vec![graph.node(start)?];
    let mut seen = HashSet::from([start]);
    let mut current = start;

    while let Some(parent) = graph.parent(current) {
        if parent.role.is_root() || !seen.insert(parent.id.as_str()) {
            break;
        }
        chain.push(parent);
        current = parent.id.as_str();
    }

    chain.reverse();
    Some(chain)
}

/// Mode A: the dialogue leading to `start`, read off the graph.
pub fn ancestor_thread(graph: &Graph, start: &str) -> Option<Thread> {
    let chain = ancestor_chain(graph, start)?;
    let messages = chain
        .into_iter()
        .filter(|node| node.role.is_dialogue())
        .filter_map(|node| {
            node.role.message_role().map(|role| ThreadMessage {
                role,
                text: node.content.clone(),
            })
        })
        .collect();
    Some(Thread { messages })
}

/// Mode B: every user/assistant row of a conversation, ordered by row id.
///
/// Ids sort byte-wise, which only matches chronology when ids are sortable
/// (timestamps, zero-padded counters). Repeated ids keep the last row.
pub fn conversation_thread(rows: &[Row], conversation_id: &str) -> Thread {
    let mut by_id = BTreeMap::<&str, &Row>::new();
    for row in rows {
        if row.conversation_id == conversation_id
            && matches!(row.role, Role::User | Role::Assistant)
        {
            by_id.insert(row.id.as_str(), row);
        }
    }

    let messages = by_id
        .into_values()
        .map(|row| ThreadMessage {
            role: row.role,
            text: row.content.clone(),
        })
        .collect();
    Thread { messages }
}

#[cfg(test)]
mod tests {
    use crate::forest::build_forest;
    use crate::model::{Role, Row};
    use crate::thread::{ancestor_chain, ancestor_thread, conversation_thread};

    fn row(id: &str, conversation_id: &str, parent_id: &str, role: Role, content: &str) -> Row {
        Row {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            parent_id: parent_id.to_string(),
            role,
            content: content.to_string(),
        }
    }

    fn branching_rows() -> Vec<Row> {
        vec![
            row("m1", "c1", "", Role::System, "You are helpful."),
            row("m2", "c1", "m1", Role::User, "Hi"),
            row("m3", "c1", "m2", Role::Assistant, "Hello!"),
            row("m4", "c1", "m3", Role::User, "branch one"),
            row("m5", "c1", "m3", Role::User, "branch two"),
            row("m6", "c1", "m5", Role::Tool, "tool output"),
            row("m7", "c1", "m6", Role::Assistant, "branch two done"),
            row("x1", "c2", "", Role::User, "unrelated"),
        ]
    }

    #[test]
    fn two_message_walk_renders_role_lines() {
        let rows = vec![
            row("a", "c1", "", Role::User, "Hi"),
            row("b", "c1", "a", Role::Assistant, "Hello!"),
        ];
        let graph = build_forest(&rows);

        let thread = ancestor_thread(&graph, "b").expect("known node");
        assert_eq!(thread.render_text(), "User: Hi\n\nAssistant: Hello!");
    }

    #[test]
    fn walk_follows_only_the_selected_branch() {
        let rows = branching_rows();
        let graph = build_forest(&rows);

        let chain = ancestor_chain(&graph, "m7").expect("known node");
        let ids: Vec<&str> = chain.iter().map(|node| node.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2", "m3", "m5", "m6", "m7"]);

        let text = ancestor_thread(&graph, "m7").expect("known node").render_text();
        assert_eq!(
            text,
            "User: Hi\n\nAssistant: Hello!\n\nUser: branch two\n\nAssistant: branch two done"
        );
        assert!(!text.contains("branch one"));
    }

    #[test]
    fn walk_from_root_nodes_has_no_dialogue() {
        let graph = build_forest(&branching_rows());

        let conversation = ancestor_thread(&graph, "conv_root_c1").expect("known node");
        assert!(conversation.is_empty());
        let central = ancestor_chain(&graph, "ROOT").expect("known node");
        assert_eq!(central.len(), 1);
    }

    #[test]
    fn walk_reports_unknown_start() {
        let graph = build_forest(&branching_rows());
        assert!(ancestor_thread(&graph, "nope").is_none());
    }

    #[test]
    fn walk_is_repeatable() {
        let graph = build_forest(&branching_rows());
        assert_eq!(ancestor_thread(&graph, "m4"), ancestor_thread(&graph, "m4"));
    }

    #[test]
    fn conversation_replay_sorts_by_id_and_skips_other_roles() {
        let rows = vec![
            row("003", "c1", "002", Role::User, "third"),
            row("001", "c1", "", Role::User, "first"),
            row("002", "c1", "001", Role::Assistant, "second"),
            row("004", "c1", "003", Role::Tool, "tool"),
            row("000", "c2", "", Role::User, "elsewhere"),
        ];

        let thread = conversation_thread(&rows, "c1");
        assert_eq!(
            thread.render_text(),
            "User: first\n\nAssistant: second\n\nUser: third"
        );
        assert!(conversation_thread(&rows, "c9").is_empty());
    }

    #[test]
    fn conversation_replay_keeps_last_duplicate() {
        let rows = vec![
            row("1", "c1", "", Role::User, "old"),
            row("1", "c1", "", Role::User, "new"),
        ];

        let thread = conversation_thread(&rows, "c1");
        assert_eq!(thread.len(), 1);
        assert_eq!(thread.render_text(), "User: new");
    }
}
