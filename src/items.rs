//! Conversation items and per-agent chat contexts
//!
//! Every item carries a stable identifier. Copies keep the identifier, so an
//! item that travelled from one agent to another during a handoff is still
//! recognised as "the same item" when it comes back. That identity is what
//! makes [`ChatContext::merge`] idempotent.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call made by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Payload of a conversation item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemContent {
    Message { role: Role, content: String },
    ToolCall { call: ToolCall },
    ToolOutput {
        call_id: String,
        name: String,
        output: String,
    },
}

/// An identity-bearing unit of chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    pub id: String,
    pub content: ItemContent,
    pub created_at: DateTime<Utc>,
}

impl ConversationItem {
    fn new(content: ItemContent) -> Self {
        Self {
            id: format!("item_{}", Uuid::new_v4().simple()),
            content,
            created_at: Utc::now(),
        }
    }

    pub fn message(role: Role, content: impl Into<String>) -> Self {
        Self::new(ItemContent::Message {
            role,
            content: content.into(),
        })
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::message(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::message(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::message(Role::Assistant, content)
    }

    pub fn tool_call(call: ToolCall) -> Self {
        Self::new(ItemContent::ToolCall { call })
    }

    pub fn tool_output(
        call_id: impl Into<String>,
        name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self::new(ItemContent::ToolOutput {
            call_id: call_id.into(),
            name: name.into(),
            output: output.into(),
        })
    }

    /// Replace the generated identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn role(&self) -> Role {
        match &self.content {
            ItemContent::Message { role, .. } => *role,
            ItemContent::ToolCall { .. } => Role::Assistant,
            ItemContent::ToolOutput { .. } => Role::Tool,
        }
    }

    pub fn is_system(&self) -> bool {
        self.role() == Role::System
    }

    /// Tool-call and tool-result records.
    pub fn is_tool_record(&self) -> bool {
        matches!(
            self.content,
            ItemContent::ToolCall { .. } | ItemContent::ToolOutput { .. }
        )
    }

    /// Text of a message item.
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Message { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// Ordered working history of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    items: Vec<ConversationItem>,
}

impl ChatContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ConversationItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationItem> {
        self.items.last()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|item| item.id == id)
    }

    pub fn push(&mut self, item: ConversationItem) {
        self.items.push(item);
    }

    /// Append a message and return its identifier.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) -> String {
        let item = ConversationItem::message(role, content);
        let id = item.id.clone();
        self.items.push(item);
        id
    }

    /// Filtered copy. Excluding tool calls drops both the call and the
    /// result records.
    pub fn copy(&self, exclude_system: bool, exclude_tool_calls: bool) -> ChatContext {
        self.items
            .iter()
            .filter(|item| !(exclude_system && item.is_system()))
            .filter(|item| !(exclude_tool_calls && item.is_tool_record()))
            .cloned()
            .collect()
    }

    /// The last `max_items` items, in their original order.
    pub fn truncate(&self, max_items: usize) -> ChatContext {
        let start = self.items.len().saturating_sub(max_items);
        self.items[start..].iter().cloned().collect()
    }

    /// Append the items of `addition` whose identifiers are not present yet.
    ///
    /// Returns the number of appended items.
    pub fn merge<I>(&mut self, addition: I) -> usize
    where
        I: IntoIterator<Item = ConversationItem>,
    {
        let mut seen: HashSet<String> = self.items.iter().map(|item| item.id.clone()).collect();
        let before = self.items.len();
        for item in addition {
            if seen.insert(item.id.clone()) {
                self.items.push(item);
            }
        }
        self.items.len() - before
    }
}

impl FromIterator<ConversationItem> for ChatContext {
    fn from_iter<T: IntoIterator<Item = ConversationItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ChatContext {
    type Item = ConversationItem;
    type IntoIter = std::vec::IntoIter<ConversationItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChatContext {
    type Item = &'a ConversationItem;
    type IntoIter = std::slice::Iter<'a, ConversationItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
