use serde::Serialize;
use serde_json::{Value, json};
use tracing::warn;

use chatstats::core::{Counters, RunResult};
use chatstats::pricing::ModelRegistry;

use crate::cli::SortOrder;
use crate::output::{hour_order, ordered_days, ranked_models};

fn to_pretty<T: Serialize>(output: &T, fallback: &str) -> String {
    serde_json::to_string_pretty(output).unwrap_or_else(|e| {
        warn!(error = %e, "failed to serialize JSON output");
        fallback.to_string()
    })
}

fn counters_json(c: &Counters) -> Value {
    json!({
        "conversations": c.conversation_count,
        "messages": c.message_count,
        "input_tokens": c.input_tokens,
        "output_tokens": c.output_tokens,
        "image_count": c.image_count,
        "total_tokens": c.total_tokens(),
        "cost": c.cost,
    })
}

pub(crate) fn daily_json(result: &RunResult, order: SortOrder, breakdown: bool) -> String {
    let output: Vec<Value> = ordered_days(&result.aggregator, order)
        .map(|(day_key, day)| {
            let mut obj = counters_json(&day.total.totals);
            obj["date"] = json!(day_key);
            obj["models"] = json!(day.models.keys().collect::<Vec<_>>());
            if breakdown {
                let models: serde_json::Map<String, Value> = day
                    .models
                    .iter()
                    .map(|(slug, bucket)| (slug.clone(), counters_json(&bucket.totals)))
                    .collect();
                obj["breakdown"] = Value::Object(models);
            }
            obj
        })
        .collect();
    to_pretty(&output, "[]")
}

pub(crate) fn hourly_json(result: &RunResult, order: SortOrder) -> String {
    let profile = result.aggregator.hourly_profile();
    let output: Vec<Value> = hour_order(order)
        .into_iter()
        .map(|hour| {
            let mut obj = counters_json(&profile[hour]);
            obj["hour"] = json!(hour);
            obj
        })
        .collect();
    to_pretty(&output, "[]")
}

pub(crate) fn models_json(result: &RunResult, registry: &ModelRegistry) -> String {
    let output: Vec<Value> = ranked_models(&result.aggregator)
        .into_iter()
        .map(|(slug, counters)| {
            let mut obj = counters_json(&counters);
            obj["category"] = json!(registry.category(&slug).label());
            obj["priced"] = json!(!registry.is_placeholder(&slug));
            obj["model"] = json!(slug);
            obj
        })
        .collect();
    to_pretty(&output, "[]")
}

pub(crate) fn summary_json(result: &RunResult) -> String {
    let agg = &result.aggregator;
    let mut obj = counters_json(&agg.grand_total());
    obj["start_date"] = json!(agg.start_date);
    obj["end_date"] = json!(agg.end_date);
    obj["active_days"] = json!(agg.dated_days().count());
    obj["cost"] = json!(agg.total_cost_all_models);
    obj["models"] = json!(agg.all_model_slugs);
    obj["processed"] = json!(result.processed);
    obj["skipped"] = json!(result.skipped);
    to_pretty(&obj, "{}")
}
