use comfy_table::{Cell, Color, Table};

use chatstats::core::{Counters, RunResult};
use chatstats::pricing::ModelRegistry;

use crate::cli::SortOrder;
use crate::output::format::{
    create_styled_table, format_compact, format_cost, format_number, header_cell, right_cell,
    styled_cell, tint,
};
use crate::output::{hour_order, ordered_days, ranked_models};

#[derive(Debug, Clone, Copy)]
pub(crate) struct TableOptions {
    pub(crate) order: SortOrder,
    pub(crate) use_color: bool,
    pub(crate) breakdown: bool,
}

/// Summary line with processing counts and timing
pub(crate) fn summary_line(result: &RunResult, use_color: bool) -> String {
    let stats_text = format!(
        "{} conversations processed ({} skipped)",
        format_number(result.processed),
        format_number(result.skipped)
    );
    if use_color {
        format!("\n  {} | \x1b[36m{:.0}ms\x1b[0m\n", stats_text, result.elapsed_ms)
    } else {
        format!("\n  {} | {:.0}ms\n", stats_text, result.elapsed_ms)
    }
}

fn title(text: &str, use_color: bool) -> String {
    if use_color {
        format!("\n  \x1b[1m{text}\x1b[0m\n")
    } else {
        format!("\n  {text}\n")
    }
}

fn headers(labels: &[&str], use_color: bool) -> Vec<Cell> {
    labels.iter().map(|l| header_cell(l, use_color)).collect()
}

/// Convs, Msgs, Input, Output, Images, Total
fn count_cells(c: &Counters, color: Option<Color>, bold: bool) -> Vec<Cell> {
    [
        c.conversation_count,
        c.message_count,
        c.input_tokens,
        c.output_tokens,
        c.image_count,
        c.total_tokens(),
    ]
    .iter()
    .map(|n| right_cell(&format_number(*n), color, bold))
    .collect()
}

fn total_row(lead: usize, total: &Counters, use_color: bool) -> Vec<Cell> {
    let cyan = tint(Color::Cyan, use_color);
    let mut row = vec![styled_cell("TOTAL", cyan, true)];
    row.extend((1..lead).map(|_| Cell::new("")));
    row.extend(count_cells(total, cyan, true));
    row.push(right_cell(&format_cost(total.cost), tint(Color::Green, use_color), true));
    row
}

pub(crate) fn render_daily(result: &RunResult, opts: TableOptions) -> String {
    let agg = &result.aggregator;
    if agg.usage_by_day.is_empty() {
        return "No usage found in this export.\n".to_string();
    }

    let c = opts.use_color;
    let green = tint(Color::Green, c);
    let mut table = create_styled_table();
    let model_label = if opts.breakdown { "Model" } else { "Models" };
    let mut header = headers(&["Date", model_label], c);
    header.extend(headers(
        &["Convs", "Msgs", "Input", "Output", "Images", "Total", "Cost"],
        c,
    ));
    table.set_header(header);

    for (day_key, day) in ordered_days(agg, opts.order) {
        if opts.breakdown {
            for (i, (slug, bucket)) in day.models.iter().enumerate() {
                let mut row = vec![
                    Cell::new(if i == 0 { day_key } else { "" }),
                    Cell::new(slug),
                ];
                row.extend(count_cells(&bucket.totals, None, false));
                row.push(right_cell(&format_cost(bucket.totals.cost), green, false));
                table.add_row(row);
            }
        } else {
            let models = day.models.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
            let mut row = vec![Cell::new(day_key), Cell::new(models)];
            row.extend(count_cells(&day.total.totals, None, false));
            row.push(right_cell(&format_cost(day.total.totals.cost), green, false));
            table.add_row(row);
        }
    }
    table.add_row(total_row(2, &agg.grand_total(), c));

    let mut out = title("ChatGPT Token Usage", c);
    out.push_str(&table.to_string());
    out.push('\n');
    out.push_str(&summary_line(result, c));
    out
}

pub(crate) fn render_hourly(result: &RunResult, opts: TableOptions) -> String {
    let agg = &result.aggregator;
    let c = opts.use_color;
    let profile = agg.hourly_profile();
    let busiest = profile
        .iter()
        .map(|h| h.message_count)
        .max()
        .unwrap_or(0);

    let mut table = create_styled_table();
    table.set_header(headers(
        &["Hour (UTC)", "Convs", "Msgs", "Input", "Output", "Images", "Total", "Cost"],
        c,
    ));
    for hour in hour_order(opts.order) {
        let bucket = &profile[hour];
        let peak = busiest > 0 && bucket.message_count == busiest;
        let label_color = if peak { tint(Color::Yellow, c) } else { None };
        let mut row = vec![styled_cell(&format!("{hour:02}:00"), label_color, peak)];
        row.extend([
            bucket.conversation_count,
            bucket.message_count,
        ]
        .iter()
        .map(|n| right_cell(&format_number(*n), None, false)));
        row.extend([
            bucket.input_tokens,
            bucket.output_tokens,
        ]
        .iter()
        .map(|n| right_cell(&format_compact(*n), None, false)));
        row.push(right_cell(&format_number(bucket.image_count), None, false));
        row.push(right_cell(&format_compact(bucket.total_tokens()), None, false));
        row.push(right_cell(&format_cost(bucket.cost), tint(Color::Green, c), false));
        table.add_row(row);
    }
    let mut dated = Counters::default();
    for bucket in &profile {
        dated.add(bucket);
    }
    table.add_row(total_row(1, &dated, c));

    let mut out = title("Usage by Hour of Day", c);
    out.push_str(&table.to_string());
    out.push('\n');
    out.push_str(&summary_line(result, c));
    out
}

pub(crate) fn render_models(result: &RunResult, registry: &ModelRegistry, opts: TableOptions) -> String {
    let agg = &result.aggregator;
    if agg.usage_by_day.is_empty() {
        return "No usage found in this export.\n".to_string();
    }

    let c = opts.use_color;
    let total = agg.grand_total();
    let mut table = create_styled_table();
    let mut header = headers(&["Model", "Category"], c);
    header.extend(headers(
        &["Convs", "Msgs", "Input", "Output", "Images", "Total", "Cost", "Share"],
        c,
    ));
    table.set_header(header);

    for (slug, counters) in ranked_models(agg) {
        let share = if total.cost > 0.0 {
            format!("{:.1}%", counters.cost / total.cost * 100.0)
        } else {
            "-".to_string()
        };
        let placeholder = registry.is_placeholder(&slug);
        let slug_color = if placeholder { tint(Color::DarkGrey, c) } else { None };
        let mut row = vec![
            styled_cell(&slug, slug_color, false),
            Cell::new(registry.category(&slug).label()),
        ];
        row.extend(count_cells(&counters, None, false));
        row.push(right_cell(&format_cost(counters.cost), tint(Color::Green, c), false));
        row.push(right_cell(&share, None, false));
        table.add_row(row);
    }
    let mut totals = total_row(2, &total, c);
    totals.push(Cell::new(""));
    table.add_row(totals);

    let mut out = title("Usage by Model", c);
    out.push_str(&table.to_string());
    out.push('\n');
    out.push_str(&summary_line(result, c));
    out
}

pub(crate) fn render_summary(result: &RunResult, tokenizer: &str, use_color: bool) -> String {
    let agg = &result.aggregator;
    let total = agg.grand_total();
    let period = match (agg.start_date, agg.end_date) {
        (Some(start), Some(end)) => format!("{start} → {end}"),
        _ => "-".to_string(),
    };

    let rows: Vec<(&str, String)> = vec![
        ("Period", period),
        ("Active days", format_number(agg.dated_days().count() as u64)),
        ("Conversations", format_number(total.conversation_count)),
        ("Assistant turns", format_number(total.message_count)),
        ("Input tokens", format_number(total.input_tokens)),
        ("Output tokens", format_number(total.output_tokens)),
        ("Images generated", format_number(total.image_count)),
        ("Models", agg.all_model_slugs.iter().cloned().collect::<Vec<_>>().join(", ")),
        ("Tokenizer", tokenizer.to_string()),
        ("Total cost", format_cost(agg.total_cost_all_models)),
    ];

    let mut table: Table = create_styled_table();
    table.set_header(headers(&["Metric", "Value"], use_color));
    for (label, value) in rows {
        let color = if label == "Total cost" { tint(Color::Green, use_color) } else { None };
        table.add_row(vec![styled_cell(label, None, true), styled_cell(&value, color, false)]);
    }

    let mut out = title("Export Summary", use_color);
    out.push_str(&table.to_string());
    out.push('\n');
    out.push_str(&summary_line(result, use_color));
    out
}
