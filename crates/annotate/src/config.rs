//! Annotation engine configuration.
//!
//! All tuning constants (viewport margin, debounce bounds, decoration cap,
//! cache size) live here rather than in the engine so embedders can adjust
//! them. Configuration is read from TOML; every field is optional and falls
//! back to its default.
//!
//! ```toml
//! enabled = true
//! margin-lines = 30
//! min-delay-ms = 25
//! max-delay-ms = 500
//! max-decorations = 1500
//! cache-capacity = 50
//! font-size = 0
//! font-family = ""
//!
//! [semantic-tokens]
//! enabled = true
//! delay-ms = 100
//! ```

use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Default number of lines fetched beyond each visible range.
pub const DEFAULT_MARGIN_LINES: u32 = 30;
/// Default lower bound for the adaptive fetch delay.
pub const DEFAULT_MIN_DELAY_MS: u64 = 25;
/// Default upper bound for the adaptive fetch delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 500;
/// Default cap on decorations produced per refresh.
pub const DEFAULT_MAX_DECORATIONS: usize = 1500;
/// Default number of (document, version) entries kept by the result cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;
/// Default debounce for viewport semantic token requests.
pub const DEFAULT_SEMANTIC_TOKENS_DELAY_MS: u64 = 100;

/// Configuration for inlay-style annotations and viewport semantic tokens.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnnotationConfig {
	/// Whether annotations are fetched and rendered at all.
	pub enabled: bool,
	/// Lines added above and below each visible range before fetching.
	pub margin_lines: u32,
	/// Lower bound of the adaptive fetch delay, in milliseconds.
	pub min_delay_ms: u64,
	/// Upper bound of the adaptive fetch delay, in milliseconds.
	pub max_delay_ms: u64,
	/// Maximum decorations produced by one refresh.
	pub max_decorations: usize,
	/// Capacity of the (document, version) result cache.
	pub cache_capacity: usize,
	/// Annotation font size in pixels; `0` derives it from the editor font.
	pub font_size: u32,
	/// Annotation font family; empty uses the editor family.
	pub font_family: String,
	/// Viewport semantic tokens settings.
	pub semantic_tokens: SemanticTokensConfig,
}

impl Default for AnnotationConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			margin_lines: DEFAULT_MARGIN_LINES,
			min_delay_ms: DEFAULT_MIN_DELAY_MS,
			max_delay_ms: DEFAULT_MAX_DELAY_MS,
			max_decorations: DEFAULT_MAX_DECORATIONS,
			cache_capacity: DEFAULT_CACHE_CAPACITY,
			font_size: 0,
			font_family: String::new(),
			semantic_tokens: SemanticTokensConfig::default(),
		}
	}
}

/// Settings for the viewport semantic tokens consumer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SemanticTokensConfig {
	/// Whether range semantic tokens are requested.
	pub enabled: bool,
	/// Fixed debounce before requesting tokens, in milliseconds.
	pub delay_ms: u64,
}

impl Default for SemanticTokensConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			delay_ms: DEFAULT_SEMANTIC_TOKENS_DELAY_MS,
		}
	}
}

impl AnnotationConfig {
	/// Parses and validates configuration from TOML text.
	pub fn from_toml_str(text: &str) -> Result<Self> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads, parses and validates a configuration file.
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
			path: path.to_path_buf(),
			source,
		})?;
		Self::from_toml_str(&text)
	}

	/// Checks cross-field constraints.
	pub fn validate(&self) -> Result<()> {
		if self.min_delay_ms > self.max_delay_ms {
			return Err(ConfigError::Invalid {
				field: "min-delay-ms",
				reason: format!("{} exceeds max-delay-ms {}", self.min_delay_ms, self.max_delay_ms),
			});
		}
		if self.max_decorations == 0 {
			return Err(ConfigError::Invalid {
				field: "max-decorations",
				reason: "must be at least 1".into(),
			});
		}
		if self.cache_capacity == 0 {
			return Err(ConfigError::Invalid {
				field: "cache-capacity",
				reason: "must be at least 1".into(),
			});
		}
		Ok(())
	}

	/// Lower bound of the adaptive delay.
	pub fn min_delay(&self) -> Duration {
		Duration::from_millis(self.min_delay_ms)
	}

	/// Upper bound of the adaptive delay.
	pub fn max_delay(&self) -> Duration {
		Duration::from_millis(self.max_delay_ms)
	}

	/// Cache capacity, never zero.
	pub fn cache_capacity(&self) -> NonZeroUsize {
		NonZeroUsize::new(self.cache_capacity).unwrap_or(NonZeroUsize::MIN)
	}
}
