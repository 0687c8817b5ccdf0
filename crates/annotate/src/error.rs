//! Error types for the provider and configuration seams.
//!
//! Nothing in the engine is fatal: provider errors are logged and the
//! request contributes no annotations, and configuration errors are surfaced
//! to whoever loads the configuration.

use std::path::PathBuf;

/// Failure reported by (or on behalf of) an annotation source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
	/// The provider rejected the request.
	#[error("provider failed: {0}")]
	Failed(String),
	/// The provider answered with data that could not be interpreted.
	#[error("malformed provider response: {0}")]
	Malformed(String),
	/// The provider panicked while computing its answer.
	#[error("provider panicked: {0}")]
	Panicked(String),
}

impl ProviderError {
	/// Creates a [`ProviderError::Failed`] from any displayable message.
	pub fn failed(msg: impl Into<String>) -> Self {
		Self::Failed(msg.into())
	}
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Reading the configuration file failed.
	#[error("failed to read {path}: {source}")]
	Io {
		/// File that could not be read.
		path: PathBuf,
		/// Underlying I/O error.
		#[source]
		source: std::io::Error,
	},
	/// The configuration text is not valid TOML for the schema.
	#[error("invalid configuration: {0}")]
	Parse(#[from] toml::de::Error),
	/// A value parsed but violates a constraint.
	#[error("invalid value for `{field}`: {reason}")]
	Invalid {
		/// Offending field.
		field: &'static str,
		/// Constraint that was violated.
		reason: String,
	},
}

/// Result alias for configuration loading.
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
