/// Standard date format used for day keys: "2025-01-15"
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sentinel day key for conversations without a usable timestamp
pub const UNKNOWN_DAY: &str = "unknown";

/// Placeholder slug for assistant messages that name no model
pub const UNKNOWN_MODEL: &str = "unknown";

pub const HOURS_PER_DAY: usize = 24;

/// Synthetic slug for deep-research tasks
pub const RESEARCH_SLUG: &str = "deep-research";

/// Synthetic slug for native (4o-style) image generation
pub const IMAGE_GEN_SLUG: &str = "gpt-image-1";

/// Synthetic slug for DALL-E tool calls
pub const DALLE_SLUG: &str = "dall-e-3";

/// Token weight for structured content parts that have no dedicated estimator
pub const UNKNOWN_PART_TOKENS: u64 = 20;
