use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chatstats::pricing::{ModelRegistry, PricingEntry};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ConfigSortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ConfigColorMode {
    Auto,
    Always,
    Never,
}

/// Rate override for one model slug (USD)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ConfigPrice {
    Image { per_image: f64 },
    Text { input: f64, output: f64 },
}

impl From<ConfigPrice> for PricingEntry {
    fn from(price: ConfigPrice) -> Self {
        match price {
            ConfigPrice::Text { input, output } => PricingEntry::text(input, output),
            ConfigPrice::Image { per_image } => PricingEntry::image(per_image),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub(crate) heuristic: bool,
    #[serde(default)]
    pub(crate) no_color: bool,
    #[serde(default)]
    pub(crate) breakdown: bool,
    #[serde(default)]
    pub(crate) debug: bool,
    #[serde(default)]
    pub(crate) order: Option<ConfigSortOrder>,
    #[serde(default)]
    pub(crate) color: Option<ConfigColorMode>,
    #[serde(default)]
    pub(crate) encoding: Option<String>,
    /// Per-slug rate overrides, keyed by model slug
    #[serde(default)]
    pub(crate) pricing: BTreeMap<String, ConfigPrice>,
}

impl Config {
    /// Load the first config file that parses.
    ///
    /// Runs before logging is installed, so findings are returned as notes
    /// for the caller to log once a subscriber exists.
    pub(crate) fn load() -> (Self, Vec<String>) {
        let mut notes = Vec::new();
        for path in Self::get_config_paths() {
            if !path.exists() {
                continue;
            }
            match fs::read_to_string(&path).map(|content| toml::from_str::<Config>(&content)) {
                Ok(Ok(config)) => {
                    notes.push(format!("Loaded config from {}", path.display()));
                    return (config, notes);
                }
                Ok(Err(e)) => notes.push(format!("Failed to parse {}: {}", path.display(), e)),
                Err(e) => notes.push(format!("Failed to read {}: {}", path.display(), e)),
            }
        }
        (Self::default(), notes)
    }

    /// Registry seeded with the built-in table plus this config's overrides
    pub(crate) fn registry(&self) -> ModelRegistry {
        let mut registry = ModelRegistry::with_defaults();
        for (slug, price) in &self.pricing {
            debug!(slug = %slug, "pricing override");
            registry.insert(slug.clone(), PricingEntry::from(*price));
        }
        registry
    }

    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. XDG config: ~/.config/chatstats/config.toml (Linux/cross-platform)
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".config").join("chatstats").join("config.toml"));
        }

        // 2. Platform config dir (macOS Application Support, Windows AppData)
        if let Some(config_dir) = dirs::config_dir() {
            let platform_path = config_dir.join("chatstats").join("config.toml");
            if !paths.contains(&platform_path) {
                paths.push(platform_path);
            }
        }

        // 3. Home directory: ~/.chatstats.toml
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".chatstats.toml"));
        }

        paths
    }
}

/// Log the notes `Config::load` collected
pub(crate) fn log_notes(notes: &[String]) {
    for note in notes {
        if note.starts_with("Loaded") {
            debug!("{note}");
        } else {
            warn!("{note}");
        }
    }
}
