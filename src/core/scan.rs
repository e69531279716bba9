//! Model pre-scan
//!
//! Collects every slug the input can charge before any aggregation starts,
//! so the registry never has to change once walking begins.

use std::collections::BTreeSet;

use rayon::prelude::*;

use crate::core::walker::effective_slug;
use crate::data::{Conversation, Role};
use crate::pricing::ModelRegistry;

fn slugs_in(conversation: &Conversation) -> BTreeSet<String> {
    let mut slugs = BTreeSet::new();
    if let Some(slug) = conversation.default_model_slug.as_deref().filter(|s| !s.is_empty()) {
        slugs.insert(slug.to_string());
    }
    for (node, message) in conversation.messages() {
        if let Some(slug) = message.image_generation_slug() {
            slugs.insert(slug.to_string());
            continue;
        }
        let named = [
            message.model_slug(),
            node.metadata.model_slug.as_deref(),
            message.metadata.default_model_slug.as_deref(),
        ];
        for slug in named.into_iter().flatten().filter(|s| !s.is_empty()) {
            slugs.insert(slug.to_string());
        }
        if message.role() == Role::Assistant {
            slugs.insert(effective_slug(conversation, node, message).to_string());
        }
    }
    slugs
}

/// Every slug referenced anywhere in `conversations`, synthetic ones included
pub(crate) fn collect_slugs(conversations: &[Conversation]) -> BTreeSet<String> {
    conversations
        .par_iter()
        .map(slugs_in)
        .reduce(BTreeSet::new, |mut acc, part| {
            acc.extend(part);
            acc
        })
}

/// Register every referenced slug; returns how many were new
pub(crate) fn prescan(conversations: &[Conversation], registry: &mut ModelRegistry) -> usize {
    collect_slugs(conversations)
        .iter()
        .filter(|slug| registry.register_if_unknown(slug))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{DALLE_SLUG, RESEARCH_SLUG, UNKNOWN_MODEL};
    use serde_json::json;

    fn conversations() -> Vec<Conversation> {
        serde_json::from_value(json!([
            {
                "default_model_slug": "gpt-4o",
                "mapping": {
                    "a": {"message": {"author": {"role": "assistant"}, "metadata": {"model_slug": "o3-mini"}}},
                    "b": {"message": {"author": {"role": "tool", "name": "dalle.text2im"}}},
                    "c": {"message": {"author": {"role": "assistant"}, "metadata": {"async_task_type": "research"}}}
                }
            },
            {
                "mapping": {
                    "d": {"metadata": {"model_slug": "gpt-4-2024-04-09"}, "message": {"author": {"role": "user"}}},
                    "e": {"message": {"author": {"role": "assistant"}}}
                }
            }
        ]))
        .unwrap()
    }

    #[test]
    fn empty_node_slug_does_not_charge_placeholder() {
        let convs: Vec<Conversation> = serde_json::from_value(json!([{
            "default_model_slug": "gpt-4",
            "mapping": {
                "a": {"metadata": {"model_slug": ""}, "message": {"author": {"role": "assistant"}}}
            }
        }]))
        .unwrap();
        let slugs = collect_slugs(&convs);
        assert!(slugs.contains("gpt-4"));
        assert!(!slugs.contains(UNKNOWN_MODEL));
        assert!(!slugs.contains(""));
    }

    #[test]
    fn collects_named_and_synthetic_slugs() {
        let slugs = collect_slugs(&conversations());
        let expected: BTreeSet<String> = [
            "gpt-4o",
            "o3-mini",
            DALLE_SLUG,
            RESEARCH_SLUG,
            "gpt-4-2024-04-09",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        // assistant "e" names no model, so the placeholder is charged
        assert!(slugs.contains(UNKNOWN_MODEL));
        assert!(expected.is_subset(&slugs));
        assert_eq!(slugs.len(), expected.len() + 1);
    }

    #[test]
    fn prescan_registers_once() {
        let convs = conversations();
        let mut registry = ModelRegistry::with_defaults();
        let added = prescan(&convs, &mut registry);
        assert!(added >= 1);
        assert!(registry.get(UNKNOWN_MODEL).is_some());
        assert!(registry.get("gpt-4-2024-04-09").is_some());
        assert!(!registry.is_placeholder("gpt-4-2024-04-09"));
        assert_eq!(prescan(&convs, &mut registry), 0);
    }

    #[test]
    fn empty_input_has_no_slugs() {
        assert!(collect_slugs(&[]).is_empty());
    }
}
