// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Scheduler configuration section.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const LOCK_FILE_NAME: &str = "storefront-cron.lock";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CronConfigLayer {
	pub lock_file: Option<PathBuf>,
	pub job_limit: Option<u32>,
	pub stuck_threshold_hours: Option<u32>,
	pub timezone: Option<String>,
	pub default_task_limit: Option<u32>,
}

impl CronConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.lock_file.is_some() {
			self.lock_file = other.lock_file;
		}
		if other.job_limit.is_some() {
			self.job_limit = other.job_limit;
		}
		if other.stuck_threshold_hours.is_some() {
			self.stuck_threshold_hours = other.stuck_threshold_hours;
		}
		if other.timezone.is_some() {
			self.timezone = other.timezone;
		}
		if other.default_task_limit.is_some() {
			self.default_task_limit = other.default_task_limit;
		}
	}

	pub fn finalize(self) -> CronConfig {
		let defaults = CronConfig::default();
		CronConfig {
			lock_file: self.lock_file.unwrap_or(defaults.lock_file),
			job_limit: self.job_limit.unwrap_or(defaults.job_limit),
			stuck_threshold_hours: self
				.stuck_threshold_hours
				.unwrap_or(defaults.stuck_threshold_hours),
			timezone: self.timezone.unwrap_or(defaults.timezone),
			default_task_limit: self.default_task_limit.unwrap_or(defaults.default_task_limit),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CronConfig {
	/// Advisory lock file guarding the run cycle.
	pub lock_file: PathBuf,
	/// Maximum queue entries processed per run.
	pub job_limit: u32,
	/// Running entries older than this are reclaimed.
	pub stuck_threshold_hours: u32,
	/// IANA zone anchor times are interpreted in.
	pub timezone: String,
	/// Per-run slice size for new queue entries whose definition sets none.
	pub default_task_limit: u32,
}

impl Default for CronConfig {
	fn default() -> Self {
		Self {
			lock_file: std::env::temp_dir().join(LOCK_FILE_NAME),
			job_limit: 10,
			stuck_threshold_hours: 1,
			timezone: "UTC".to_string(),
			default_task_limit: 100,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = CronConfig::default();
		assert_eq!(config.job_limit, 10);
		assert_eq!(config.stuck_threshold_hours, 1);
		assert_eq!(config.timezone, "UTC");
		assert_eq!(config.default_task_limit, 100);
		assert!(config.lock_file.ends_with("storefront-cron.lock"));
	}

	#[test]
	fn test_layer_finalize_with_values() {
		let layer = CronConfigLayer {
			lock_file: Some(PathBuf::from("/run/storefront/cron.lock")),
			job_limit: Some(50),
			..Default::default()
		};
		let config = layer.finalize();
		assert_eq!(config.lock_file, PathBuf::from("/run/storefront/cron.lock"));
		assert_eq!(config.job_limit, 50);
		assert_eq!(config.stuck_threshold_hours, 1);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = CronConfigLayer {
			job_limit: Some(10),
			timezone: Some("UTC".to_string()),
			..Default::default()
		};
		base.merge(CronConfigLayer {
			job_limit: Some(3),
			..Default::default()
		});
		assert_eq!(base.job_limit, Some(3));
		assert_eq!(base.timezone.as_deref(), Some("UTC"));
	}

	#[test]
	fn test_serde_roundtrip() {
		let config = CronConfig {
			timezone: "Europe/Berlin".to_string(),
			stuck_threshold_hours: 4,
			..Default::default()
		};
		let toml_str = toml::to_string(&config).unwrap();
		let parsed: CronConfig = toml::from_str(&toml_str).unwrap();
		assert_eq!(config, parsed);
	}
}
