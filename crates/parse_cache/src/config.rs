//! Registry configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;
use strata_worker::TaskClass;

/// Errors that can occur when loading a [`ParseCacheConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
	#[error("expiry_capacity must be at least 1")]
	ZeroExpiryCapacity,
}

/// Tuning knobs for [`crate::ParseCache`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParseCacheConfig {
	/// Number of recently parsed, closed files whose caches stay warm.
	pub expiry_capacity: usize,
	/// Whether files open in an editor also go through the expiry queue.
	pub expire_open_documents: bool,
	/// Worker class for background fan-outs.
	pub async_class: TaskClass,
}

impl Default for ParseCacheConfig {
	fn default() -> Self {
		Self {
			expiry_capacity: 16,
			expire_open_documents: false,
			async_class: TaskClass::CpuBlocking,
		}
	}
}

impl ParseCacheConfig {
	/// Parses a config from TOML text; missing keys keep their defaults.
	pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
		let cfg: Self = toml::from_str(text)?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		self.expiry_limit().map(|_| ()).ok_or(ConfigError::ZeroExpiryCapacity)
	}

	pub(crate) fn expiry_limit(&self) -> Option<NonZeroUsize> {
		NonZeroUsize::new(self.expiry_capacity)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_toml_yields_defaults() {
		assert_eq!(ParseCacheConfig::from_toml_str("").unwrap(), ParseCacheConfig::default());
	}

	#[test]
	fn overrides_are_applied() {
		let cfg = ParseCacheConfig::from_toml_str(
			r#"
			expiry_capacity = 2
			expire_open_documents = true
			async_class = "background"
			"#,
		)
		.unwrap();
		assert_eq!(
			cfg,
			ParseCacheConfig {
				expiry_capacity: 2,
				expire_open_documents: true,
				async_class: TaskClass::Background,
			}
		);
	}

	#[test]
	fn zero_capacity_is_rejected() {
		let err = ParseCacheConfig::from_toml_str("expiry_capacity = 0").unwrap_err();
		assert!(matches!(err, ConfigError::ZeroExpiryCapacity));
	}

	#[test]
	fn unknown_keys_are_rejected() {
		assert!(matches!(ParseCacheConfig::from_toml_str("bogus = 1"), Err(ConfigError::Toml(_))));
	}
}
