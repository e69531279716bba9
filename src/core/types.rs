//! Aggregation data model
//!
//! Day → model → hour counters. Every level carries the same counter set so
//! the hour buckets always sum to their parent's totals.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::consts::HOURS_PER_DAY;
use crate::pricing::Usage;

/// Leaf counters; also used for the daily totals of each bucket
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Counters {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Images produced by image-generation models
    pub image_count: u64,
    pub cost: f64,
    pub message_count: u64,
    pub conversation_count: u64,
}

pub type HourBucket = Counters;

impl Counters {
    pub(crate) fn apply(&mut self, usage: Usage, cost: f64) {
        match usage {
            Usage::Text {
                input_tokens,
                output_tokens,
            } => {
                self.input_tokens += input_tokens;
                self.output_tokens += output_tokens;
            }
            Usage::Image { count } => self.image_count += count,
        }
        self.cost += cost;
        self.message_count += 1;
    }

    pub fn add(&mut self, other: &Counters) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.image_count += other.image_count;
        self.cost += other.cost;
        self.message_count += other.message_count;
        self.conversation_count += other.conversation_count;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Daily totals plus their 24 hourly slices
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BucketWithHours {
    #[serde(flatten)]
    pub totals: Counters,
    pub hours: [HourBucket; HOURS_PER_DAY],
}

impl BucketWithHours {
    pub(crate) fn apply(&mut self, hour: usize, usage: Usage, cost: f64) {
        self.totals.apply(usage, cost);
        self.hours[hour].apply(usage, cost);
    }

    pub(crate) fn add_conversation(&mut self, hour: usize) {
        self.totals.conversation_count += 1;
        self.hours[hour].conversation_count += 1;
    }

    /// Sum of the hourly slices; equals `totals` by construction
    pub fn hour_sum(&self) -> Counters {
        let mut sum = Counters::default();
        for hour in &self.hours {
            sum.add(hour);
        }
        sum
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub total: BucketWithHours,
    pub models: BTreeMap<String, BucketWithHours>,
}

/// Result of one run. Built by the orchestrator, read-only afterwards.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Aggregator {
    pub usage_by_day: BTreeMap<String, DayBucket>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_cost_all_models: f64,
    pub all_model_slugs: BTreeSet<String>,
}

/// Outcome of an orchestrator run
#[derive(Debug, Default)]
pub struct RunResult {
    pub aggregator: Aggregator,
    /// Conversations walked
    pub processed: u64,
    /// Entries skipped as malformed
    pub skipped: u64,
    /// Processing time in milliseconds
    pub elapsed_ms: f64,
}
