use serde::Serialize;

/// Rate card for one model slug (USD)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingEntry {
    Text {
        input_per_million: f64,
        output_per_million: f64,
    },
    Image {
        per_image: f64,
    },
}

impl PricingEntry {
    pub const ZERO: PricingEntry = PricingEntry::Text {
        input_per_million: 0.0,
        output_per_million: 0.0,
    };

    pub const fn text(input_per_million: f64, output_per_million: f64) -> Self {
        PricingEntry::Text {
            input_per_million,
            output_per_million,
        }
    }

    pub const fn image(per_image: f64) -> Self {
        PricingEntry::Image { per_image }
    }
}

/// One usage update. Image generation is counted in images, never in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Text { input_tokens: u64, output_tokens: u64 },
    Image { count: u64 },
}

impl Usage {
    pub fn text(input_tokens: u64, output_tokens: u64) -> Self {
        Usage::Text {
            input_tokens,
            output_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelCategory {
    Chat,
    Reasoning,
    Image,
    Research,
    Unknown,
}

impl ModelCategory {
    pub fn label(self) -> &'static str {
        match self {
            ModelCategory::Chat => "chat",
            ModelCategory::Reasoning => "reasoning",
            ModelCategory::Image => "image",
            ModelCategory::Research => "research",
            ModelCategory::Unknown => "unknown",
        }
    }
}
