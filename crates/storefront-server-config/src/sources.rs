// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: built-in defaults, a TOML file and the environment.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::StorefrontConfigLayer;
use crate::sections::{CronConfigLayer, DatabaseConfigLayer, LogFormat, LoggingConfigLayer};

/// Default location of the system config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/storefront/cron.toml";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<StorefrontConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<StorefrontConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(StorefrontConfigLayer::default())
	}
}

/// TOML file source. A missing file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new(SYSTEM_CONFIG_PATH)
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<StorefrontConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(StorefrontConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: StorefrontConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: STOREFRONT_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<StorefrontConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(StorefrontConfigLayer {
			database: Some(load_database_from_env()),
			cron: Some(load_cron_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_database_from_env() -> DatabaseConfigLayer {
	DatabaseConfigLayer {
		url: env_var("STOREFRONT_DATABASE_URL"),
	}
}

fn load_cron_from_env() -> Result<CronConfigLayer, ConfigError> {
	Ok(CronConfigLayer {
		lock_file: env_var("STOREFRONT_CRON_LOCK_FILE").map(PathBuf::from),
		job_limit: env_u32("STOREFRONT_CRON_JOB_LIMIT")?,
		stuck_threshold_hours: env_u32("STOREFRONT_CRON_STUCK_THRESHOLD_HOURS")?,
		timezone: env_var("STOREFRONT_CRON_TIMEZONE"),
		default_task_limit: env_u32("STOREFRONT_CRON_DEFAULT_TASK_LIMIT")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = env_var("STOREFRONT_LOG_FORMAT")
		.map(|v| {
			v.parse::<LogFormat>().map_err(|message| ConfigError::InvalidValue {
				key: "STOREFRONT_LOG_FORMAT".to_string(),
				message,
			})
		})
		.transpose()?;

	Ok(LoggingConfigLayer {
		level: env_var("STOREFRONT_LOG_LEVEL"),
		format,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_precedence_ordering() {
		assert!(Precedence::Environment > Precedence::ConfigFile);
		assert!(Precedence::ConfigFile > Precedence::Defaults);
	}

	#[test]
	fn test_defaults_source_returns_empty_layer() {
		let layer = DefaultsSource.load().unwrap();
		assert!(layer.cron.is_none());
		assert!(layer.database.is_none());
	}

	#[test]
	fn test_toml_source_missing_file_returns_empty() {
		let layer = TomlSource::new("/nonexistent/cron.toml").load().unwrap();
		assert!(layer.cron.is_none());
	}

	#[test]
	fn test_toml_source_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[cron]\njob_limit = 4\ntimezone = \"America/New_York\"").unwrap();

		let layer = TomlSource::new(file.path()).load().unwrap();
		let cron = layer.cron.unwrap();
		assert_eq!(cron.job_limit, Some(4));
		assert_eq!(cron.timezone.as_deref(), Some("America/New_York"));
	}

	#[test]
	fn test_toml_source_reports_parse_errors() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[cron]\njob_limit = \"lots\"").unwrap();

		let err = TomlSource::new(file.path()).load().unwrap_err();
		assert!(matches!(err, ConfigError::TomlParse { .. }));
	}

	#[test]
	fn test_env_u32_unset() {
		assert_eq!(env_u32("STOREFRONT_TEST_SOURCES_UNSET_U32").unwrap(), None);
	}
}
