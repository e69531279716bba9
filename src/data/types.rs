//! Typed view of a ChatGPT conversation export
//!
//! Every field is optional or defaulted: exports from different eras disagree
//! on shape, and a single odd node must not sink its whole conversation.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

use crate::consts::{DALLE_SLUG, IMAGE_GEN_SLUG};

/// Author name the native image generation tool uses in exports
const IMAGE_GEN_TOOL_NAME: &str = "t2uay3k.sj1i4kz";

// ============================================================================
// Deserialization helpers
// ============================================================================

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept numbers and numeric strings; anything else becomes `None`
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Content that names no `content_type`, or does not fit its declared
/// shape, becomes `Content::Unknown` instead of failing the node
fn lenient_content<'de, D>(deserializer: D) -> Result<Content, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Content::Unknown);
    };
    Ok(serde_json::from_value(value).unwrap_or_else(|err| {
        tracing::debug!(error = %err, "unrecognized content shape, weighting as unknown");
        Content::Unknown
    }))
}

// ============================================================================
// Conversation and nodes
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub create_time: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mapping: NodeMap,
    #[serde(default)]
    pub default_model_slug: Option<String>,
}

impl Conversation {
    pub fn display_id(&self) -> &str {
        self.id
            .as_deref()
            .or(self.conversation_id.as_deref())
            .unwrap_or("<no id>")
    }

    /// Messages in mapping order, skipping nodes that carry none
    pub fn messages(&self) -> impl Iterator<Item = (&Node, &Message)> {
        self.mapping
            .nodes()
            .filter_map(|node| node.message.as_ref().map(|m| (node, m)))
    }
}

/// Node mapping kept in document order.
///
/// Nodes that fail to deserialize are dropped individually.
#[derive(Debug, Clone, Default)]
pub struct NodeMap(Vec<(String, Node)>);

impl NodeMap {
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.0.iter().map(|(_, node)| node)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for NodeMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NodeMapVisitor;

        impl<'de> Visitor<'de> for NodeMapVisitor {
            type Value = NodeMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of node id to node")
            }

            fn visit_map<A>(self, mut access: A) -> Result<NodeMap, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut nodes = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, raw)) = access.next_entry::<String, Value>()? {
                    match serde_json::from_value::<Node>(raw) {
                        Ok(node) => nodes.push((id, node)),
                        Err(err) => tracing::debug!(node = %id, error = %err, "skipping malformed node"),
                    }
                }
                Ok(NodeMap(nodes))
            }
        }

        deserializer.deserialize_map(NodeMapVisitor)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Tool,
    Assistant,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: Author,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub create_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Content,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub end_turn: Option<bool>,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub model_slug: Option<String>,
    #[serde(default)]
    pub default_model_slug: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub citations: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_result_groups: Vec<Value>,
    #[serde(default)]
    pub reasoning_status: Option<String>,
    #[serde(default)]
    pub async_task_type: Option<String>,
    #[serde(default)]
    pub image_gen_title: Option<Value>,
    #[serde(default)]
    pub image_gen_async: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Content {
    Text {
        #[serde(default, deserialize_with = "null_as_default")]
        parts: Vec<Value>,
    },
    MultimodalText {
        #[serde(default, deserialize_with = "null_as_default")]
        parts: Vec<Value>,
    },
    Code {
        #[serde(default)]
        text: Option<String>,
    },
    Thoughts {
        #[serde(default, deserialize_with = "null_as_default")]
        thoughts: Vec<Thought>,
    },
    ReasoningRecap {
        #[serde(default)]
        content: Option<String>,
    },
    TetherQuote {
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
    ExecutionOutput {
        #[serde(default)]
        text: Option<String>,
    },
    TetherBrowsingDisplay {
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        summary: Option<String>,
    },
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Thought {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Thought {
    pub fn text(&self) -> String {
        match (self.summary.as_deref(), self.content.as_deref()) {
            (Some(s), Some(c)) => format!("{s}\n{c}"),
            (Some(s), None) => s.to_string(),
            (None, Some(c)) => c.to_string(),
            (None, None) => String::new(),
        }
    }
}

// ============================================================================
// Content parts
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Detail {
    Low,
    #[default]
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImagePart {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub detail: Detail,
    /// Carries generation metadata (produced by an image model, not uploaded)
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part<'a> {
    Text(&'a str),
    Image(ImagePart),
    Other,
}

impl<'a> Part<'a> {
    pub fn from_value(value: &'a Value) -> Part<'a> {
        match value {
            Value::String(s) => Part::Text(s),
            Value::Object(obj) => {
                if obj.get("content_type").and_then(Value::as_str) != Some("image_asset_pointer")
                {
                    return Part::Other;
                }
                let dim = |key: &str| {
                    obj.get(key)
                        .and_then(Value::as_u64)
                        .and_then(|v| u32::try_from(v).ok())
                };
                let detail = match obj.get("detail").and_then(Value::as_str) {
                    Some("low") => Detail::Low,
                    _ => Detail::High,
                };
                let generated = obj
                    .get("metadata")
                    .and_then(|m| m.get("generation").or_else(|| m.get("dalle")))
                    .is_some_and(|g| !g.is_null());
                Part::Image(ImagePart {
                    width: dim("width"),
                    height: dim("height"),
                    detail,
                    generated,
                })
            }
            _ => Part::Other,
        }
    }
}

// ============================================================================
// Message classification
// ============================================================================

impl Message {
    pub fn role(&self) -> Role {
        self.author.role
    }

    pub fn parts(&self) -> &[Value] {
        match &self.content {
            Content::Text { parts } | Content::MultimodalText { parts } => parts,
            _ => &[],
        }
    }

    /// End of an assistant turn: explicit flag or the terminal channel
    pub fn is_final(&self) -> bool {
        self.end_turn == Some(true) || self.channel.as_deref() == Some("final")
    }

    pub fn is_reasoning_recap(&self) -> bool {
        matches!(self.content, Content::ReasoningRecap { .. })
            || self.metadata.reasoning_status.as_deref() == Some("reasoning_ended")
    }

    pub fn is_research_task(&self) -> bool {
        self.metadata
            .async_task_type
            .as_deref()
            .is_some_and(|t| t.contains("research"))
    }

    /// Synthetic slug for a tool message that produced generated images
    pub fn image_generation_slug(&self) -> Option<&'static str> {
        if self.role() != Role::Tool {
            return None;
        }
        let name = self.author.name.as_deref().unwrap_or("");
        if name.starts_with("dalle") {
            return Some(DALLE_SLUG);
        }
        let flagged = name == IMAGE_GEN_TOOL_NAME
            || self.metadata.image_gen_title.as_ref().is_some_and(|v| !v.is_null())
            || self.metadata.image_gen_async.as_ref().is_some_and(|v| !v.is_null());
        let has_generated_part = self
            .parts()
            .iter()
            .any(|p| matches!(Part::from_value(p), Part::Image(img) if img.generated));
        (flagged || has_generated_part).then_some(IMAGE_GEN_SLUG)
    }

    /// Model slug named on the message itself, ignoring empty strings
    pub fn model_slug(&self) -> Option<&str> {
        self.metadata
            .model_slug
            .as_deref()
            .filter(|s| !s.is_empty())
    }
}
