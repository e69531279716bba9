//! Conversation processing
//!
//! Flattens a conversation's node map into turn entries, then replays them
//! through a rolling-context accumulator: everything said so far (including
//! earlier assistant output) is input for the next assistant turn.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::consts::{RESEARCH_SLUG, UNKNOWN_MODEL, UNKNOWN_PART_TOKENS};
use crate::core::types::Aggregator;
use crate::data::{Content, Conversation, Message, Node, Part, Role};
use crate::pricing::{ModelRegistry, Usage};
use crate::tokens::{TokenCounter, estimate_image_tokens};
use crate::utils::bucket_for;

const DEFAULT_IMAGE_SIDE: u32 = 1024;

/// One message reduced to the numbers the accumulator needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlatTurnEntry {
    pub(crate) role: Role,
    pub(crate) content_tokens: u64,
    pub(crate) output_tokens: u64,
    pub(crate) search_tokens: u64,
    pub(crate) model_slug: String,
    pub(crate) is_reasoning_recap: bool,
    pub(crate) is_final: bool,
}

impl FlatTurnEntry {
    fn new(role: Role, model_slug: String) -> Self {
        Self {
            role,
            content_tokens: 0,
            output_tokens: 0,
            search_tokens: 0,
            model_slug,
            is_reasoning_recap: false,
            is_final: false,
        }
    }
}

/// A finished assistant turn to be charged to `model_slug`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TurnCommit {
    pub(crate) model_slug: String,
    pub(crate) input_tokens: u64,
    pub(crate) output_tokens: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Accumulated {
    pub(crate) commits: Vec<TurnCommit>,
    /// Real model slugs seen on assistant entries, committed or not
    pub(crate) discovered: BTreeSet<String>,
}

/// Replay entries through the rolling context.
///
/// Context is never reset within a conversation. A final assistant entry
/// commits the context accumulated before it plus all output pending since
/// the previous commit; its own tokens join the context afterwards.
pub(crate) fn accumulate(entries: &[FlatTurnEntry]) -> Accumulated {
    let mut result = Accumulated::default();
    let mut context_tokens: u64 = 0;
    let mut pending_output: u64 = 0;

    for entry in entries {
        if entry.is_reasoning_recap {
            continue;
        }
        context_tokens += entry.search_tokens;

        if entry.role != Role::Assistant {
            context_tokens += entry.content_tokens;
            continue;
        }

        pending_output += entry.output_tokens;
        if entry.model_slug != UNKNOWN_MODEL {
            result.discovered.insert(entry.model_slug.clone());
        }
        if entry.is_final {
            result.commits.push(TurnCommit {
                model_slug: entry.model_slug.clone(),
                input_tokens: context_tokens,
                output_tokens: pending_output,
            });
            pending_output = 0;
        }
        context_tokens += entry.content_tokens + entry.output_tokens;
    }

    result
}

/// Model a message is charged to.
///
/// Deep-research tasks go to the research slug; otherwise the first slug
/// found on the message, its node, or the conversation defaults.
pub(crate) fn effective_slug<'a>(
    conversation: &'a Conversation,
    node: &'a Node,
    message: &'a Message,
) -> &'a str {
    if message.is_research_task() {
        return RESEARCH_SLUG;
    }
    [
        message.model_slug(),
        node.metadata.model_slug.as_deref(),
        message.metadata.default_model_slug.as_deref(),
        conversation.default_model_slug.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.is_empty())
    .unwrap_or(UNKNOWN_MODEL)
}

fn generated_image_count(message: &Message) -> u64 {
    message
        .parts()
        .iter()
        .filter(|p| matches!(Part::from_value(p), Part::Image(_)))
        .count() as u64
}

pub struct ConversationWalker<'a> {
    registry: &'a ModelRegistry,
    counter: &'a TokenCounter,
}

impl<'a> ConversationWalker<'a> {
    pub fn new(registry: &'a ModelRegistry, counter: &'a TokenCounter) -> Self {
        Self { registry, counter }
    }

    /// Process one conversation into `aggregator`; returns the slugs it touched
    pub async fn process(
        &self,
        conversation: &Conversation,
        aggregator: &mut Aggregator,
    ) -> BTreeSet<String> {
        let bucket = bucket_for(conversation.create_time);
        if bucket.is_unknown() {
            debug!(
                conversation = conversation.display_id(),
                "no usable timestamp, using sentinel day"
            );
        }
        let mut contributing: BTreeSet<String> = BTreeSet::new();
        let mut entries = Vec::with_capacity(conversation.mapping.len());

        for (node, message) in conversation.messages() {
            if let Some(slug) = message.image_generation_slug() {
                for _ in 0..generated_image_count(message) {
                    aggregator.update_usage(
                        self.registry,
                        &bucket.day_key,
                        bucket.hour,
                        slug,
                        Usage::Image { count: 1 },
                    );
                    contributing.insert(slug.to_string());
                }
                continue;
            }
            entries.push(self.flatten(conversation, node, message).await);
        }

        let Accumulated {
            commits,
            discovered,
        } = accumulate(&entries);
        for commit in &commits {
            aggregator.update_usage(
                self.registry,
                &bucket.day_key,
                bucket.hour,
                &commit.model_slug,
                Usage::text(commit.input_tokens, commit.output_tokens),
            );
            contributing.insert(commit.model_slug.clone());
        }

        if !contributing.is_empty() {
            aggregator.record_conversation(
                &bucket.day_key,
                bucket.hour,
                contributing.iter().map(String::as_str),
            );
        }

        debug!(
            conversation = conversation.display_id(),
            day = %bucket.day_key,
            entries = entries.len(),
            turns = commits.len(),
            "processed conversation"
        );

        contributing.extend(discovered);
        contributing
    }

    async fn count(&self, text: &str) -> u64 {
        self.counter.count_or_estimate(text).await
    }

    async fn count_json(&self, values: &[Value]) -> u64 {
        match serde_json::to_string(values) {
            Ok(json) => self.count(&json).await,
            Err(_) => 0,
        }
    }

    async fn flatten(
        &self,
        conversation: &Conversation,
        node: &Node,
        message: &Message,
    ) -> FlatTurnEntry {
        let role = message.role();
        let slug = effective_slug(conversation, node, message).to_string();
        let mut entry = FlatTurnEntry::new(role, slug);
        entry.is_final = message.is_final();
        entry.is_reasoning_recap = message.is_reasoning_recap();
        if entry.is_reasoning_recap {
            return entry;
        }

        let assistant = role == Role::Assistant;
        match &message.content {
            Content::Text { parts } | Content::MultimodalText { parts } => {
                for part in parts {
                    match Part::from_value(part) {
                        Part::Text(text) => {
                            let n = self.count(text).await;
                            if assistant {
                                entry.output_tokens += n;
                            } else {
                                entry.content_tokens += n;
                            }
                        }
                        Part::Image(image) => {
                            entry.content_tokens += estimate_image_tokens(
                                image.width.unwrap_or(DEFAULT_IMAGE_SIDE),
                                image.height.unwrap_or(DEFAULT_IMAGE_SIDE),
                                image.detail,
                            );
                        }
                        Part::Other => entry.content_tokens += UNKNOWN_PART_TOKENS,
                    }
                }
            }
            Content::Thoughts { thoughts } => {
                for thought in thoughts {
                    let n = self.count(&thought.text()).await;
                    if assistant {
                        entry.output_tokens += n;
                    } else {
                        entry.content_tokens += n;
                    }
                }
            }
            Content::Code { text } | Content::ExecutionOutput { text } => {
                entry.content_tokens += self.count(text.as_deref().unwrap_or("")).await;
            }
            Content::TetherQuote { title, text } => {
                for field in [title, text].into_iter().flatten() {
                    entry.content_tokens += self.count(field).await;
                }
            }
            Content::TetherBrowsingDisplay { result, summary } => {
                for field in [result, summary].into_iter().flatten() {
                    entry.content_tokens += self.count(field).await;
                }
            }
            Content::ReasoningRecap { .. } => {}
            Content::Unknown => entry.content_tokens += UNKNOWN_PART_TOKENS,
        }

        let metadata = &message.metadata;
        if role == Role::Tool && !metadata.search_result_groups.is_empty() {
            entry.search_tokens += self.count_json(&metadata.search_result_groups).await;
        }
        if !metadata.citations.is_empty() {
            entry.content_tokens += self.count_json(&metadata.citations).await;
        }

        entry
    }
}
