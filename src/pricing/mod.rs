mod registry;
mod resolver;
mod types;

pub use registry::ModelRegistry;
pub use types::{ModelCategory, PricingEntry, Usage};
