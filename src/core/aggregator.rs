//! Usage aggregation
//!
//! `update_usage` is the only writer for token, image, cost and message
//! counters; `record_conversation` is the only writer for conversation counts.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::consts::{HOURS_PER_DAY, UNKNOWN_DAY};
use crate::core::types::{Aggregator, BucketWithHours, Counters, DayBucket};
use crate::pricing::{ModelRegistry, Usage};

fn hour_index(hour: u32) -> usize {
    (hour as usize).min(HOURS_PER_DAY - 1)
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one usage update to the model's and the day's buckets, daily and hourly
    pub fn update_usage(
        &mut self,
        registry: &ModelRegistry,
        day_key: &str,
        hour: u32,
        model_slug: &str,
        usage: Usage,
    ) {
        let hour = hour_index(hour);
        let cost = registry.get_cost(model_slug, usage);

        let day = self.usage_by_day.entry(day_key.to_string()).or_default();
        day.models
            .entry(model_slug.to_string())
            .or_default()
            .apply(hour, usage, cost);
        day.total.apply(hour, usage, cost);

        if !self.all_model_slugs.contains(model_slug) {
            self.all_model_slugs.insert(model_slug.to_string());
        }
    }

    /// Count one conversation for the day and for each model it used that day
    pub fn record_conversation<'a>(
        &mut self,
        day_key: &str,
        hour: u32,
        models: impl IntoIterator<Item = &'a str>,
    ) {
        let hour = hour_index(hour);
        let day = self.usage_by_day.entry(day_key.to_string()).or_default();
        day.total.add_conversation(hour);
        for model in models {
            day.models
                .entry(model.to_string())
                .or_default()
                .add_conversation(hour);
        }
    }

    pub fn set_date_range(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.start_date = start;
        self.end_date = end;
    }

    /// Sum every day's total cost into `total_cost_all_models`
    pub fn finalize_total_cost(&mut self) {
        self.total_cost_all_models = self.usage_by_day.values().map(|d| d.total.totals.cost).sum();
    }

    pub fn merge_slugs<I: IntoIterator<Item = String>>(&mut self, slugs: I) {
        self.all_model_slugs.extend(slugs);
    }

    /// Days with a real date, excluding the sentinel bucket
    pub fn dated_days(&self) -> impl Iterator<Item = (&String, &DayBucket)> {
        self.usage_by_day.iter().filter(|(day, _)| day.as_str() != UNKNOWN_DAY)
    }

    /// Grand totals across every day, the sentinel day included
    pub fn grand_total(&self) -> Counters {
        let mut total = Counters::default();
        for day in self.usage_by_day.values() {
            total.add(&day.total.totals);
        }
        total
    }

    /// Per-model totals across every day
    pub fn model_totals(&self) -> BTreeMap<String, Counters> {
        let mut models: BTreeMap<String, Counters> = BTreeMap::new();
        for day in self.usage_by_day.values() {
            for (slug, bucket) in &day.models {
                models.entry(slug.clone()).or_default().add(&bucket.totals);
            }
        }
        models
    }

    /// Hour-of-day profile summed across dated days.
    ///
    /// The sentinel day has no real hour, so it stays out of the profile.
    pub fn hourly_profile(&self) -> [Counters; HOURS_PER_DAY] {
        let mut profile: [Counters; HOURS_PER_DAY] = Default::default();
        for (_, day) in self.dated_days() {
            for (slot, hour) in profile.iter_mut().zip(&day.total.hours) {
                slot.add(hour);
            }
        }
        profile
    }
}

/// Check the bucket invariants; returns a description of the first violation
#[cfg(test)]
pub(crate) fn check_invariants(agg: &Aggregator) -> Result<(), String> {
    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }
    fn same(a: &Counters, b: &Counters) -> bool {
        a.input_tokens == b.input_tokens
            && a.output_tokens == b.output_tokens
            && a.image_count == b.image_count
            && a.message_count == b.message_count
            && a.conversation_count == b.conversation_count
            && close(a.cost, b.cost)
    }
    let bucket_ok = |label: &str, b: &BucketWithHours| {
        if same(&b.hour_sum(), &b.totals) {
            Ok(())
        } else {
            Err(format!("{label}: hours do not sum to totals"))
        }
    };

    let mut cost_sum = 0.0;
    for (day_key, day) in &agg.usage_by_day {
        bucket_ok(day_key, &day.total)?;
        let mut model_sum = Counters::default();
        for (slug, bucket) in &day.models {
            bucket_ok(&format!("{day_key}/{slug}"), bucket)?;
            model_sum.add(&bucket.totals);
            if !agg.all_model_slugs.contains(slug) {
                return Err(format!("{slug} missing from all_model_slugs"));
            }
        }
        let t = &day.total.totals;
        if model_sum.input_tokens != t.input_tokens
            || model_sum.output_tokens != t.output_tokens
            || model_sum.image_count != t.image_count
            || model_sum.message_count != t.message_count
            || !close(model_sum.cost, t.cost)
        {
            return Err(format!("{day_key}: total differs from sum of models"));
        }
        cost_sum += t.cost;
    }
    if !close(cost_sum, agg.total_cost_all_models) {
        return Err("total_cost_all_models differs from sum of days".to_string());
    }
    Ok(())
}
