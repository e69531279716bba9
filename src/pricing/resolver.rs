use std::collections::HashMap;

use super::types::{ModelCategory, PricingEntry};
use crate::consts::{DALLE_SLUG, IMAGE_GEN_SLUG, RESEARCH_SLUG};

/// Built-in rates for slugs that appear in ChatGPT exports (USD per million tokens)
pub(super) fn default_pricing() -> HashMap<String, PricingEntry> {
    let text = [
        ("text-davinci-002-render-sha", 0.5, 1.5),
        ("text-davinci-002-render-sha-mobile", 0.5, 1.5),
        ("gpt-3.5-turbo", 0.5, 1.5),
        ("gpt-4", 30.0, 60.0),
        ("gpt-4-browsing", 30.0, 60.0),
        ("gpt-4-plugins", 30.0, 60.0),
        ("gpt-4-code-interpreter", 30.0, 60.0),
        ("gpt-4-mobile", 30.0, 60.0),
        ("gpt-4-gizmo", 30.0, 60.0),
        ("gpt-4-turbo", 10.0, 30.0),
        ("gpt-4o", 2.5, 10.0),
        ("gpt-4o-canmore", 2.5, 10.0),
        ("gpt-4o-mini", 0.15, 0.6),
        ("gpt-4-5", 75.0, 150.0),
        ("gpt-4.5", 75.0, 150.0),
        ("gpt-4-1", 2.0, 8.0),
        ("gpt-4.1", 2.0, 8.0),
        ("gpt-4-1-mini", 0.4, 1.6),
        ("gpt-4.1-mini", 0.4, 1.6),
        ("o1-preview", 15.0, 60.0),
        ("o1", 15.0, 60.0),
        ("o1-mini", 1.1, 4.4),
        ("o1-pro", 150.0, 600.0),
        ("o3", 2.0, 8.0),
        ("o3-mini", 1.1, 4.4),
        ("o3-mini-high", 1.1, 4.4),
        ("o3-pro", 20.0, 80.0),
        ("o4-mini", 1.1, 4.4),
        ("o4-mini-high", 1.1, 4.4),
        ("gpt-5", 1.25, 10.0),
        ("gpt-5-thinking", 1.25, 10.0),
        ("gpt-5-mini", 0.25, 2.0),
        ("gpt-5-pro", 15.0, 120.0),
        (RESEARCH_SLUG, 10.0, 40.0),
    ];

    let mut models: HashMap<String, PricingEntry> = text
        .into_iter()
        .map(|(slug, input, output)| (slug.to_string(), PricingEntry::text(input, output)))
        .collect();
    models.insert(IMAGE_GEN_SLUG.to_string(), PricingEntry::image(0.042));
    models.insert(DALLE_SLUG.to_string(), PricingEntry::image(0.04));
    models
}

/// Strip a trailing release date: `-2024-08-06` or `-20240806`
fn strip_date_suffix(slug: &str) -> Option<&str> {
    let is_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());

    if let Some(pos) = slug.rfind('-') {
        let suffix = &slug[pos + 1..];
        if suffix.len() == 8 && is_digits(suffix) {
            return Some(&slug[..pos]);
        }
    }

    // Dashed form: split off the last three segments
    let mut segments = slug.rsplitn(4, '-');
    let day = segments.next()?;
    let month = segments.next()?;
    let year = segments.next()?;
    let base = segments.next()?;
    let dated = [(year, 4), (month, 2), (day, 2)]
        .iter()
        .all(|&(part, len)| part.len() == len && is_digits(part));
    dated.then_some(base)
}

/// Find a known rate for a slug not present verbatim
pub(super) fn resolve_known(
    slug: &str,
    models: &HashMap<String, PricingEntry>,
) -> Option<PricingEntry> {
    if let Some(entry) = models.get(slug) {
        return Some(*entry);
    }
    let base = strip_date_suffix(slug)?;
    models.get(base).copied()
}

pub(super) fn categorize(slug: &str, entry: Option<&PricingEntry>, placeholder: bool) -> ModelCategory {
    if placeholder || entry.is_none() {
        return ModelCategory::Unknown;
    }
    if matches!(entry, Some(PricingEntry::Image { .. })) {
        return ModelCategory::Image;
    }

    let lower = slug.to_lowercase();
    if lower.contains("research") {
        return ModelCategory::Research;
    }
    let o_series = lower.starts_with('o') && lower.chars().nth(1).is_some_and(|c| c.is_ascii_digit());
    if o_series || lower.contains("thinking") || lower.ends_with("-pro") {
        return ModelCategory::Reasoning;
    }
    ModelCategory::Chat
}
