use std::collections::{HashMap, HashSet};

use super::resolver::{categorize, default_pricing, resolve_known};
use super::types::{ModelCategory, PricingEntry, Usage};

/// Pricing table owned by one run.
///
/// Mutated only while the input is pre-scanned; afterwards it is lent out
/// by shared reference, so lookups never insert mid-aggregation.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, PricingEntry>,
    placeholders: HashSet<String>,
}

impl ModelRegistry {
    /// Registry seeded with the built-in rate table
    pub fn with_defaults() -> Self {
        Self {
            models: default_pricing(),
            placeholders: HashSet::new(),
        }
    }

    /// Insert or replace a rate (config overrides)
    pub fn insert(&mut self, slug: impl Into<String>, entry: PricingEntry) {
        let slug = slug.into();
        self.placeholders.remove(&slug);
        self.models.insert(slug, entry);
    }

    /// Ensure `slug` has an entry. Returns true if the registry changed.
    ///
    /// Dated variants of a known model inherit its rate; anything else gets
    /// a zero-rate placeholder so it is tracked rather than dropped.
    pub fn register_if_unknown(&mut self, slug: &str) -> bool {
        if self.models.contains_key(slug) {
            return false;
        }
        match resolve_known(slug, &self.models) {
            Some(entry) => {
                self.models.insert(slug.to_string(), entry);
            }
            None => {
                self.models.insert(slug.to_string(), PricingEntry::ZERO);
                self.placeholders.insert(slug.to_string());
            }
        }
        true
    }

    pub fn get(&self, slug: &str) -> Option<&PricingEntry> {
        self.models.get(slug)
    }

    pub fn is_placeholder(&self, slug: &str) -> bool {
        self.placeholders.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Cost in USD. Absent slugs cost nothing; so does a usage kind that
    /// does not match the slug's rate card.
    pub fn get_cost(&self, slug: &str, usage: Usage) -> f64 {
        let entry = self.models.get(slug).copied().unwrap_or(PricingEntry::ZERO);
        match (entry, usage) {
            (
                PricingEntry::Text {
                    input_per_million,
                    output_per_million,
                },
                Usage::Text {
                    input_tokens,
                    output_tokens,
                },
            ) => {
                input_tokens as f64 / 1e6 * input_per_million
                    + output_tokens as f64 / 1e6 * output_per_million
            }
            (PricingEntry::Image { per_image }, Usage::Image { count }) => count as f64 * per_image,
            _ => 0.0,
        }
    }

    pub fn category(&self, slug: &str) -> ModelCategory {
        categorize(slug, self.models.get(slug), self.is_placeholder(slug))
    }
}
