use std::fmt;
use std::str::FromStr;

use serde::Serialize;

pub const CENTRAL_ROOT_ID: &str = "ROOT";
pub const CENTRAL_ROOT_LABEL: &str = "You";
pub const CENTRAL_ROOT_CONTENT: &str = "Central node representing all conversations.";
pub const CONVERSATION_ROOT_PREFIX: &str = "conv_root_";
pub const CONVERSATION_FALLBACK_LABEL: &str = "Conversation";

pub const MESSAGE_PREVIEW_CHARS: usize = 30;
pub const CONVERSATION_PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    /// Capitalized form used in `Role: content` thread lines.
    pub fn title(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::System => "System",
            Self::Tool => "Tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            "tool" => Ok(Self::Tool),
            _ => Err(input.to_string()),
        }
    }
}

/// One exported chat message. Never mutated after ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub id: String,
    pub conversation_id: String,
    /// Empty when the export names no parent.
    pub parent_id: String,
    pub role: Role,
    pub content: String,
}

impl Row {
    pub fn parent(&self) -> Option<&str> {
        if self.parent_id.is_empty() {
            None
        } else {
            Some(&self.parent_id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    User,
    Assistant,
    System,
    Tool,
    ConversationRoot,
    CentralRoot,
}

impl NodeRole {
    /// Synthetic roots end an ancestor walk and are never part of a thread.
    pub fn is_root(self) -> bool {
        matches!(self, Self::ConversationRoot | Self::CentralRoot)
    }

    pub fn is_dialogue(self) -> bool {
        matches!(self, Self::User | Self::Assistant)
    }

    pub fn message_role(self) -> Option<Role> {
        match self {
            Self::User => Some(Role::User),
            Self::Assistant => Some(Role::Assistant),
            Self::System => Some(Role::System),
            Self::Tool => Some(Role::Tool),
            Self::ConversationRoot | Self::CentralRoot => None,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::User => "#3b82f6",
            Self::Assistant => "#10b981",
            Self::System => "#64748b",
            Self::Tool => "#a855f7",
            Self::ConversationRoot => "#f97316",
            Self::CentralRoot => "#d946ef",
        }
    }

    pub fn weight(self) -> u32 {
        match self {
            Self::User | Self::Assistant | Self::System | Self::Tool => 3,
            Self::ConversationRoot => 8,
            Self::CentralRoot => 30,
        }
    }
}

impl From<Role> for NodeRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Self::User,
            Role::Assistant => Self::Assistant,
            Role::System => Self::System,
            Role::Tool => Self::Tool,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
            Self::Tool => write!(f, "tool"),
            Self::ConversationRoot => write!(f, "conversation_root"),
            Self::CentralRoot => write!(f, "central_root"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub content: String,
    pub role: NodeRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub color: &'static str,
    pub val: u32,
}

impl Node {
    pub fn central_root() -> Self {
        Self::synthetic(
            CENTRAL_ROOT_ID.to_string(),
            CENTRAL_ROOT_LABEL.to_string(),
            CENTRAL_ROOT_CONTENT.to_string(),
            NodeRole::CentralRoot,
            None,
        )
    }

    pub fn conversation_root(conversation_id: &str, first_message: Option<&Row>) -> Self {
        let label = first_message.map_or_else(
            || CONVERSATION_FALLBACK_LABEL.to_string(),
            |row| format!("{}...", preview(&row.content, CONVERSATION_PREVIEW_CHARS)),
        );
        let content = format!("Root of conversation: \"{label}\"");
        Self::synthetic(
            conversation_root_id(conversation_id),
            label,
            content,
            NodeRole::ConversationRoot,
            Some(conversation_id.to_string()),
        )
    }

    pub fn message(row: &Row) -> Self {
        let role = NodeRole::from(row.role);
        Self {
            id: row.id.clone(),
            label: format!(
                "{}: {}...",
                row.role,
                preview(&row.content, MESSAGE_PREVIEW_CHARS)
            ),
            content: row.content.clone(),
            role,
            conversation_id: Some(row.conversation_id.clone()),
            color: role.color(),
            val: role.weight(),
        }
    }

    fn synthetic(
        id: String,
        label: String,
        content: String,
        role: NodeRole,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            id,
            label,
            content,
            role,
            conversation_id,
            color: role.color(),
            val: role.weight(),
        }
    }
}

/// Directed parent pointer from `source` (child) to `target` (parent).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(child_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        Self {
            source: child_id.into(),
            target: parent_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub role: Role,
    pub text: String,
}

pub fn conversation_root_id(conversation_id: &str) -> String {
    format!("{CONVERSATION_ROOT_PREFIX}{conversation_id}")
}

/// First `max_chars` characters of `input`, without any suffix.
pub fn preview(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((end, _)) => &input[..end],
        None => input,
    }
}
