// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Cron definition types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::error::{CronError, Result};
use crate::job_type;

/// Longest accepted frequency: one leap year.
pub const MAX_FREQUENCY_HOURS: u32 = 24 * 366;

/// Unique identifier for a cron definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CronId(pub i64);

impl fmt::Display for CronId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for CronId {
	type Err = ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(s.trim().parse()?))
	}
}

/// A persistent schedule for one job type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronDefinition {
	pub id: CronId,
	pub job_type: String,
	pub name: Option<String>,

	/// Hours between runs. Zero marks a run-once definition that must be
	/// re-armed externally.
	pub frequency_hours: u32,
	/// The schedule is eligible on or after this date.
	pub start_date: NaiveDate,
	/// Time-of-day the schedule is phase-locked to.
	pub anchor_time: Option<NaiveTime>,

	/// External resource the job operates on, copied onto new queue entries.
	pub foreign_key_id: Option<i64>,
	pub foreign_key: Option<String>,
	pub table_name: Option<String>,
	/// Per-run slice size handed to new queue entries.
	pub task_limit: Option<u32>,

	pub last_start: Option<DateTime<Utc>>,
	pub last_finish: Option<DateTime<Utc>>,
	pub next_start: Option<DateTime<Utc>>,
}

impl CronDefinition {
	/// Anchor time, defaulting to midnight.
	pub fn anchor(&self) -> NaiveTime {
		self.anchor_time.unwrap_or(NaiveTime::MIN)
	}

	pub fn is_run_once(&self) -> bool {
		self.frequency_hours == 0
	}

	pub fn is_permanent(&self) -> bool {
		job_type::is_permanent(&self.job_type)
	}

	/// Whether the schedule itself makes this definition due at `now`.
	///
	/// Queue presence is not considered here; the store only offers
	/// definitions without an outstanding queue entry.
	pub fn is_due(&self, now: DateTime<Utc>, tz: &Tz) -> bool {
		if self.start_date > now.with_timezone(tz).date_naive() {
			return false;
		}

		match self.next_start {
			None => true,
			Some(next) if next > now => false,
			Some(next) => {
				// Run-once definitions only fire again after being re-armed.
				!self.is_run_once() || self.last_finish.map_or(true, |finish| next > finish)
			}
		}
	}

	pub fn display_name(&self) -> &str {
		self.name.as_deref().unwrap_or(&self.job_type)
	}
}

/// Input for creating a cron definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCronDefinition {
	pub job_type: String,
	pub name: Option<String>,
	pub frequency_hours: u32,
	pub start_date: NaiveDate,
	pub anchor_time: Option<NaiveTime>,
	pub foreign_key_id: Option<i64>,
	pub foreign_key: Option<String>,
	pub table_name: Option<String>,
	pub task_limit: Option<u32>,
}

impl NewCronDefinition {
	/// A daily definition anchored at midnight.
	pub fn new(job_type: impl Into<String>, start_date: NaiveDate) -> Self {
		Self {
			job_type: job_type.into(),
			name: None,
			frequency_hours: 24,
			start_date,
			anchor_time: None,
			foreign_key_id: None,
			foreign_key: None,
			table_name: None,
			task_limit: None,
		}
	}

	pub fn with_name(mut self, name: impl Into<String>) -> Self {
		self.name = Some(name.into());
		self
	}

	pub fn with_frequency(mut self, hours: u32) -> Self {
		self.frequency_hours = hours;
		self
	}

	pub fn with_anchor(mut self, anchor: NaiveTime) -> Self {
		self.anchor_time = Some(anchor);
		self
	}

	pub fn with_task_limit(mut self, limit: u32) -> Self {
		self.task_limit = Some(limit);
		self
	}

	pub fn with_foreign_key(
		mut self,
		id: i64,
		key: impl Into<String>,
		table: impl Into<String>,
	) -> Self {
		self.foreign_key_id = Some(id);
		self.foreign_key = Some(key.into());
		self.table_name = Some(table.into());
		self
	}

	/// Frequencies above [`MAX_FREQUENCY_HOURS`] are rejected as input mistakes.
	pub fn validate(&self) -> Result<()> {
		job_type::validate_tag(&self.job_type)?;
		if self.frequency_hours > MAX_FREQUENCY_HOURS {
			return Err(CronError::InvalidFrequency(i64::from(self.frequency_hours)));
		}
		Ok(())
	}
}
