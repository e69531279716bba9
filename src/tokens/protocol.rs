//! Messages exchanged with the tokenizer worker
//!
//! Shapes mirror the JSON protocol: `{id, text}` out; `{id, count}`,
//! `{id, count, error, fallbackUsed}`, `{id, error}` or `{type: "ready"}` back.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizeRequest {
    pub id: u64,
    pub text: String,
}

/// Unsolicited worker lifecycle signals (no correlation id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Signal {
    Ready,
    Unavailable { error: String },
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerMessage {
    Signal(Signal),
    Counted {
        id: u64,
        count: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(rename = "fallbackUsed", default, skip_serializing_if = "is_false")]
        fallback_used: bool,
    },
    Failed {
        id: u64,
        error: String,
    },
}

impl WorkerMessage {
    pub fn counted(id: u64, count: u64) -> Self {
        WorkerMessage::Counted {
            id,
            count,
            error: None,
            fallback_used: false,
        }
    }

    pub fn fallback(id: u64, count: u64, error: String) -> Self {
        WorkerMessage::Counted {
            id,
            count,
            error: Some(error),
            fallback_used: true,
        }
    }
}
