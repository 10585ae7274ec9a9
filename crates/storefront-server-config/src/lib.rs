// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the storefront cron scheduler.
//!
//! Layers are merged in precedence order: built-in defaults, then the TOML
//! file (`/etc/storefront/cron.toml` unless overridden), then `STOREFRONT_*`
//! environment variables.

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::StorefrontConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource, SYSTEM_CONFIG_PATH,
};

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct StorefrontConfig {
	pub database: DatabaseConfig,
	pub cron: CronConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<StorefrontConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<StorefrontConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	];
	load_from_sources(sources)
}

/// Load configuration from environment only.
pub fn load_config_from_env() -> Result<StorefrontConfig, ConfigError> {
	let sources: Vec<Box<dyn ConfigSource>> = vec![Box::new(DefaultsSource), Box::new(EnvSource)];
	load_from_sources(sources)
}

pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<StorefrontConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = StorefrontConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

/// Finalize a merged layer into resolved, validated configuration.
pub fn finalize(layer: StorefrontConfigLayer) -> Result<StorefrontConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let cron = layer.cron.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&cron)?;

	info!(
		database = %database.url,
		lock_file = %cron.lock_file.display(),
		job_limit = cron.job_limit,
		stuck_threshold_hours = cron.stuck_threshold_hours,
		timezone = %cron.timezone,
		"cron configuration loaded"
	);

	Ok(StorefrontConfig {
		database,
		cron,
		logging,
	})
}

fn validate_config(cron: &CronConfig) -> Result<(), ConfigError> {
	if cron.job_limit == 0 {
		return Err(ConfigError::Validation(
			"cron.job_limit must be at least 1".to_string(),
		));
	}
	if cron.stuck_threshold_hours == 0 {
		return Err(ConfigError::Validation(
			"cron.stuck_threshold_hours must be at least 1".to_string(),
		));
	}
	if cron.timezone.parse::<chrono_tz::Tz>().is_err() {
		return Err(ConfigError::Validation(format!(
			"cron.timezone '{}' is not an IANA timezone",
			cron.timezone
		)));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use std::io::Write;

	struct FixedSource(Precedence, StorefrontConfigLayer);

	impl ConfigSource for FixedSource {
		fn name(&self) -> &'static str {
			"fixed"
		}

		fn precedence(&self) -> Precedence {
			self.0
		}

		fn load(&self) -> Result<StorefrontConfigLayer, ConfigError> {
			Ok(self.1.clone())
		}
	}

	fn cron_layer(job_limit: u32) -> StorefrontConfigLayer {
		StorefrontConfigLayer {
			cron: Some(CronConfigLayer {
				job_limit: Some(job_limit),
				..Default::default()
			}),
			..Default::default()
		}
	}

	#[test]
	fn test_defaults_resolve() {
		let config = finalize(StorefrontConfigLayer::default()).unwrap();
		assert_eq!(config.database.url, "sqlite:./storefront.db");
		assert_eq!(config.cron.job_limit, 10);
		assert_eq!(config.logging.format, LogFormat::Pretty);
	}

	#[test]
	fn test_higher_precedence_wins_regardless_of_order() {
		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(FixedSource(Precedence::Environment, cron_layer(7))),
			Box::new(FixedSource(Precedence::ConfigFile, cron_layer(3))),
		];
		let config = load_from_sources(sources).unwrap();
		assert_eq!(config.cron.job_limit, 7);
	}

	#[test]
	fn test_config_file_overrides_defaults() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[cron]\nstuck_threshold_hours = 6").unwrap();

		let sources: Vec<Box<dyn ConfigSource>> = vec![
			Box::new(DefaultsSource),
			Box::new(TomlSource::new(file.path())),
		];
		let config = load_from_sources(sources).unwrap();
		assert_eq!(config.cron.stuck_threshold_hours, 6);
		assert_eq!(config.cron.job_limit, 10);
	}

	#[test]
	fn test_zero_job_limit_rejected() {
		let err = finalize(cron_layer(0)).unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn test_zero_threshold_rejected() {
		let layer = StorefrontConfigLayer {
			cron: Some(CronConfigLayer {
				stuck_threshold_hours: Some(0),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_err());
	}

	#[test]
	fn test_unknown_timezone_rejected() {
		let layer = StorefrontConfigLayer {
			cron: Some(CronConfigLayer {
				timezone: Some("Mars/Olympus_Mons".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		assert!(finalize(layer).is_err());
	}

	proptest! {
		#[test]
		fn last_source_with_value_wins(limits in proptest::collection::vec(1u32..1000, 1..4)) {
			let precedences = [Precedence::Defaults, Precedence::ConfigFile, Precedence::Environment];
			let sources: Vec<Box<dyn ConfigSource>> = limits
				.iter()
				.zip(precedences)
				.map(|(limit, precedence)| {
					Box::new(FixedSource(precedence, cron_layer(*limit))) as Box<dyn ConfigSource>
				})
				.collect();

			let config = load_from_sources(sources).unwrap();
			prop_assert_eq!(config.cron.job_limit, *limits.last().unwrap());
		}
	}
}
