//! Run orchestration: parse → pre-scan → date range → walk → total cost.

use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::scan::prescan;
use crate::core::types::{Aggregator, RunResult};
use crate::core::walker::ConversationWalker;
use crate::data::Conversation;
use crate::pricing::ModelRegistry;
use crate::tokens::TokenCounter;
use crate::utils::day_of;

/// Owns the model registry for one or more runs
#[derive(Debug, Default)]
pub struct Orchestrator {
    registry: ModelRegistry,
}

fn parse_entry(index: usize, entry: &Value) -> Option<Conversation> {
    if !entry.is_object() {
        warn!(index, "skipping entry that is not an object");
        return None;
    }
    match Conversation::deserialize(entry) {
        Ok(conversation) => Some(conversation),
        Err(err) => {
            warn!(index, error = %err, "skipping malformed conversation");
            None
        }
    }
}

impl Orchestrator {
    pub fn new(registry: ModelRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Aggregate every conversation in `input`.
    ///
    /// Entries that are not conversation objects are skipped and counted.
    pub async fn run(&mut self, input: &[Value], counter: &TokenCounter) -> RunResult {
        let start = Instant::now();

        let parsed: Vec<Option<Conversation>> = input
            .par_iter()
            .enumerate()
            .map(|(index, entry)| parse_entry(index, entry))
            .collect();
        let skipped = parsed.iter().filter(|c| c.is_none()).count() as u64;
        let conversations: Vec<Conversation> = parsed.into_iter().flatten().collect();

        let registered = prescan(&conversations, &mut self.registry);
        debug!(
            conversations = conversations.len(),
            skipped,
            registered,
            "pre-scan complete"
        );

        let mut aggregator = Aggregator::new();
        let days: Vec<NaiveDate> = conversations
            .iter()
            .filter_map(|c| day_of(c.create_time))
            .collect();
        aggregator.set_date_range(days.iter().min().copied(), days.iter().max().copied());

        let walker = ConversationWalker::new(&self.registry, counter);
        for conversation in &conversations {
            let touched = walker.process(conversation, &mut aggregator).await;
            aggregator.merge_slugs(touched);
        }

        aggregator.finalize_total_cost();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            days = aggregator.usage_by_day.len(),
            models = aggregator.all_model_slugs.len(),
            total_cost = aggregator.total_cost_all_models,
            elapsed_ms,
            "aggregation complete"
        );

        RunResult {
            aggregator,
            processed: conversations.len() as u64,
            skipped,
            elapsed_ms,
        }
    }
}
