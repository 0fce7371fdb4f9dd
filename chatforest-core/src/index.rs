use std::collections::HashMap;

use crate::model::Row;

/// Id lookups over a borrowed row list.
///
/// Duplicate row ids are not rejected: the last row carrying an id wins.
#[derive(Debug, Clone, Default)]
pub struct RowIndex<'a> {
    rows_by_id: HashMap<&'a str, &'a Row>,
    first_messages: HashMap<&'a str, &'a Row>,
}

impl<'a> RowIndex<'a> {
    pub fn build(rows: &'a [Row]) -> Self {
        let mut rows_by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            rows_by_id.insert(row.id.as_str(), row);
        }

        let mut index = Self {
            rows_by_id,
            first_messages: HashMap::new(),
        };

        for row in rows {
            if index.is_top_level(row) {
                index
                    .first_messages
                    .entry(row.conversation_id.as_str())
                    .or_insert(row);
            }
        }

        index
    }

    pub fn len(&self) -> usize {
        self.rows_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows_by_id.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&'a Row> {
        self.rows_by_id.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows_by_id.contains_key(id)
    }

    /// The row's parent, when it names one that is part of the dataset.
    pub fn parent_of(&self, row: &Row) -> Option<&'a Row> {
        row.parent().and_then(|parent_id| self.get(parent_id))
    }

    /// A row is top-level when its parent is absent or outside the dataset.
    pub fn is_top_level(&self, row: &Row) -> bool {
        self.parent_of(row).is_none()
    }

    /// Earliest top-level row of a conversation, in input order.
    pub fn first_message(&self, conversation_id: &str) -> Option<&'a Row> {
        self.first_messages.get(conversation_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use crate::index::RowIndex;
    use crate::model::{Role, Row};

    fn row(id: &str, conversation_id: &str, parent_id: &str, content: &str) -> Row {
        Row {
            id: id.to_string(),
            conversation_id: conversation_id.to_string(),
            parent_id: parent_id.to_string(),
            role: Role::User,
            content: content.to_string(),
        }
    }

    #[test]
    fn dangling_parent_counts_as_first_message() {
        let rows = vec![
            row("b", "c1", "missing", "dangling"),
            row("a", "c1", "", "explicit root"),
        ];
        let index = RowIndex::build(&rows);

        assert!(index.is_top_level(&rows[0]));
        assert!(index.is_top_level(&rows[1]));
        let first = index.first_message("c1").expect("first message");
        assert_eq!(first.id, "b");
    }

    #[test]
    fn resolvable_parent_is_not_first_message() {
        let rows = vec![row("b", "c1", "a", "reply"), row("a", "c1", "", "root")];
        let index = RowIndex::build(&rows);

        assert_eq!(index.parent_of(&rows[0]).map(|r| r.id.as_str()), Some("a"));
        assert_eq!(index.first_message("c1").map(|r| r.id.as_str()), Some("a"));
        assert!(index.first_message("c2").is_none());
    }

    #[test]
    fn duplicate_ids_keep_last_row() {
        let rows = vec![row("a", "c1", "", "first"), row("a", "c1", "", "second")];
        let index = RowIndex::build(&rows);

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").map(|r| r.content.as_str()), Some("second"));
    }
}
