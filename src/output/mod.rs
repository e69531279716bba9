//! Rendering of aggregation results as tables or JSON

mod format;
mod json;
mod table;

use chatstats::consts::{HOURS_PER_DAY, UNKNOWN_DAY};
use chatstats::core::{Aggregator, Counters, DayBucket};

use crate::cli::SortOrder;

pub(crate) use json::{daily_json, hourly_json, models_json, summary_json};
pub(crate) use table::{TableOptions, render_daily, render_hourly, render_models, render_summary};

/// Dated days in the requested order, then the sentinel day if present
fn ordered_days(agg: &Aggregator, order: SortOrder) -> impl Iterator<Item = (&str, &DayBucket)> {
    let mut days: Vec<_> = agg.dated_days().map(|(k, d)| (k.as_str(), d)).collect();
    if order == SortOrder::Desc {
        days.reverse();
    }
    let unknown = agg
        .usage_by_day
        .get_key_value(UNKNOWN_DAY)
        .map(|(k, d)| (k.as_str(), d));
    days.into_iter().chain(unknown)
}

fn hour_order(order: SortOrder) -> Vec<usize> {
    let mut hours: Vec<usize> = (0..HOURS_PER_DAY).collect();
    if order == SortOrder::Desc {
        hours.reverse();
    }
    hours
}

/// Per-model totals, most expensive first
fn ranked_models(agg: &Aggregator) -> Vec<(String, Counters)> {
    let mut models: Vec<_> = agg.model_totals().into_iter().collect();
    models.sort_by(|(a_slug, a), (b_slug, b)| {
        b.cost
            .total_cmp(&a.cost)
            .then_with(|| a_slug.cmp(b_slug))
    });
    models
}
