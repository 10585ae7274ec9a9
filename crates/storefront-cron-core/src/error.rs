// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for cron scheduling.

use thiserror::Error;

/// Result type for cron core operations.
pub type Result<T> = std::result::Result<T, CronError>;

/// Errors that can occur while validating or parsing cron data.
#[derive(Debug, Error)]
pub enum CronError {
	#[error("invalid job type tag: {0}")]
	InvalidJobType(String),

	#[error("invalid anchor time: {0}")]
	InvalidAnchor(String),

	#[error("invalid timezone: {0}")]
	InvalidTimezone(String),

	#[error("invalid frequency: {0} hours")]
	InvalidFrequency(i64),

	#[error("next start for a {0}-hour frequency is out of range")]
	ScheduleOverflow(u32),
}
