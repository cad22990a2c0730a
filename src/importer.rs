//! Type definitions for the ChatGPT data export (`conversations.json`).
//!
//! The export is a JSON array of conversations. Each conversation stores its
//! messages as a tree in `mapping`: every node knows its parent and children, and
//! editing or regenerating a message starts a new branch. `current_node` points at
//! the leaf of the branch that was last shown in the UI.
//!
//! Only the fields needed to render Markdown are modelled; everything else in the
//! export is ignored by serde.
//!
//! ```json
//! {
//!   "title": "Quadratic formula",
//!   "create_time": 1700000000.0,
//!   "update_time": 1700000100.5,
//!   "current_node": "b",
//!   "mapping": {
//!     "a": { "id": "a", "message": null, "parent": null, "children": ["b"] },
//!     "b": { "id": "b", "parent": "a", "children": [], "message": {
//!       "author": { "role": "user" },
//!       "create_time": 1700000000.0,
//!       "content": { "content_type": "text", "parts": ["Hi"] }
//!     } }
//!   }
//! }
//! ```
use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::BranchMode;

pub const IMAGE_ASSET_POINTER: &str = "image_asset_pointer";

/// Author name of the image generation tool; its files live in `dalle-generations/`.
pub const DALLE_TOOL: &str = "dalle.text2im";

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One entry of `conversations.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub id: Option<String>,
    /// Newer exports duplicate `id` here; older ones only carry this field.
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// Unix seconds.
    #[serde(default)]
    pub create_time: Option<f64>,
    /// Unix seconds.
    #[serde(default)]
    pub update_time: Option<f64>,
    #[serde(default)]
    pub current_node: Option<String>,
    #[serde(default)]
    pub mapping: BTreeMap<String, Node>,
}

/// A node of the message tree. System scaffolding nodes carry no message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
}

impl Conversation {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().or(self.conversation_id.as_deref())
    }

    /// Messages in reading order.
    pub fn messages(&self, branch: BranchMode) -> Vec<&Message> {
        if branch == BranchMode::Current
            && let Some(path) = self.current_branch()
        {
            return path;
        }
        self.all_messages()
    }

    /// Every message of every branch, stably sorted by creation time.
    /// Messages without a timestamp come first.
    fn all_messages(&self) -> Vec<&Message> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();

        let roots = self.mapping.iter().filter_map(|(id, node)| {
            let orphan = node
                .parent
                .as_ref()
                .is_none_or(|p| !self.mapping.contains_key(p));
            orphan.then_some(id.as_str())
        });
        // Second sweep picks up nodes only reachable through a cycle.
        let starts: Vec<&str> = roots
            .chain(self.mapping.keys().map(String::as_str))
            .collect();

        for start in starts {
            let mut stack = vec![start];
            while let Some(id) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                let Some(node) = self.mapping.get(id) else {
                    continue;
                };
                if let Some(message) = &node.message {
                    out.push(message);
                }
                stack.extend(node.children.iter().rev().map(String::as_str));
            }
        }

        out.sort_by(|a, b| {
            let a = a.create_time.unwrap_or(f64::NEG_INFINITY);
            let b = b.create_time.unwrap_or(f64::NEG_INFINITY);
            a.total_cmp(&b)
        });
        out
    }

    /// Root-to-leaf path ending at `current_node`, if that node exists.
    fn current_branch(&self) -> Option<Vec<&Message>> {
        let mut id = self.current_node.as_deref()?;
        if !self.mapping.contains_key(id) {
            return None;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        let mut path = Vec::new();
        while let Some(node) = self.mapping.get(id) {
            if !visited.insert(id) {
                break;
            }
            if let Some(message) = &node.message {
                path.push(message);
            }
            match node.parent.as_deref() {
                Some(parent) => id = parent,
                None => break,
            }
        }
        path.reverse();
        Some(path)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Author,
    /// Unix seconds.
    #[serde(default)]
    pub create_time: Option<f64>,
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Author {
    #[serde(default = "unknown_role")]
    pub role: String,
    #[serde(default)]
    pub name: Option<String>,
}

fn unknown_role() -> String {
    "unknown".to_string()
}

impl Default for Author {
    fn default() -> Self {
        Self {
            role: unknown_role(),
            name: None,
        }
    }
}

impl Author {
    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    pub fn is_image_tool(&self) -> bool {
        self.role == "tool" && self.name.as_deref() == Some(DALLE_TOOL)
    }
}

/// Message body. Depending on `content_type` the payload sits in `parts`
/// (text, multimodal), `text` (code, execution output) or `result` (browsing).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub parts: Option<Vec<Value>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
}

/// A renderable piece of a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image(ImagePart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePart {
    /// `file-service://file-…` or `sediment://file_…`.
    pub asset_pointer: String,
    /// Prompt recorded by the image tool, when there is one.
    pub dalle_prompt: Option<String>,
}

impl Message {
    pub fn parts(&self) -> Vec<ContentPart> {
        let content = &self.content;
        if let Some(parts) = &content.parts {
            parts.iter().filter_map(part_from_value).collect()
        } else if let Some(text) = &content.text {
            vec![ContentPart::Text(text.clone())]
        } else if let Some(result) = &content.result {
            vec![ContentPart::Text(result.clone())]
        } else {
            debug!(
                content_type = content.content_type.as_deref().unwrap_or("?"),
                "Message has no renderable content"
            );
            Vec::new()
        }
    }

    /// All text parts, each terminated by a newline.
    pub fn text(&self) -> String {
        self.parts()
            .into_iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text + "\n"),
                ContentPart::Image(_) => None,
            })
            .collect()
    }

    pub fn has_images(&self) -> bool {
        self.parts()
            .iter()
            .any(|p| matches!(p, ContentPart::Image(_)))
    }
}

fn part_from_value(value: &Value) -> Option<ContentPart> {
    match value {
        Value::String(text) => Some(ContentPart::Text(text.clone())),
        Value::Object(obj) => {
            if obj.get("content_type").and_then(Value::as_str) == Some(IMAGE_ASSET_POINTER) {
                let asset_pointer = obj
                    .get("asset_pointer")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let dalle_prompt = obj
                    .get("metadata")
                    .and_then(|m| m.get("dalle"))
                    .and_then(|d| d.get("prompt"))
                    .and_then(Value::as_str)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string);
                Some(ContentPart::Image(ImagePart {
                    asset_pointer,
                    dalle_prompt,
                }))
            } else {
                let text = obj.get("text").and_then(Value::as_str).unwrap_or_default();
                Some(ContentPart::Text(text.to_string()))
            }
        }
        Value::Null => None,
        other => Some(ContentPart::Text(other.to_string())),
    }
}

/// The conversation title, or one made up from the first line of text.
pub fn infer_title(title: Option<&str>, messages: &[&Message]) -> String {
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        return title.to_string();
    }
    messages
        .iter()
        .flat_map(|m| m.parts())
        .find_map(|part| match part {
            ContentPart::Text(text) if !text.trim().is_empty() => {
                let first_line = text.trim().lines().next().unwrap_or_default().to_string();
                Some(first_line + "...")
            }
            _ => None,
        })
        .unwrap_or_else(|| "Untitled".to_string())
}
