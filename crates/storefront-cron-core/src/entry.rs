// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queue entry types.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use crate::definition::CronId;

/// Unique identifier for a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(pub i64);

impl fmt::Display for QueueId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for QueueId {
	type Err = ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(s.trim().parse()?))
	}
}

/// One outstanding or in-flight execution slot for a cron definition.
///
/// The trailing block of fields is joined from the owning definition and is
/// never written back through the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
	pub id: QueueId,
	pub cron_id: CronId,

	pub foreign_key_id: Option<i64>,
	pub foreign_key: Option<String>,
	pub table_name: Option<String>,

	/// Tasks a job may process in one run.
	pub task_limit: u32,
	/// Tasks processed so far across runs.
	pub tasks_executed: u32,
	/// Resume marker: the last item the job finished.
	pub last_processed_id: Option<i64>,

	pub is_running: bool,
	/// The entry is not runnable before this instant.
	pub start_time: DateTime<Utc>,
	pub last_start: Option<DateTime<Utc>>,
	pub last_finish: Option<DateTime<Utc>>,

	// Joined from the owning definition.
	pub job_type: String,
	pub name: Option<String>,
	pub frequency_hours: u32,
	pub anchor_time: Option<NaiveTime>,
	pub start_date: NaiveDate,
	pub next_start: Option<DateTime<Utc>>,
}

impl QueueEntry {
	pub fn progress(&self) -> Progress {
		Progress {
			task_limit: self.task_limit,
			tasks_executed: self.tasks_executed,
			last_processed_id: self.last_processed_id,
		}
	}

	pub fn anchor(&self) -> NaiveTime {
		self.anchor_time.unwrap_or(NaiveTime::MIN)
	}

	/// Flat record of this entry, keyed by field name.
	pub fn to_record(&self) -> serde_json::Result<serde_json::Value> {
		serde_json::to_value(self)
	}
}

/// Progress counters a job persists between runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
	pub task_limit: u32,
	pub tasks_executed: u32,
	pub last_processed_id: Option<i64>,
}

#[cfg(test)]
pub(crate) mod fixtures {
	use super::*;
	use chrono::TimeZone;

	pub fn entry() -> QueueEntry {
		QueueEntry {
			id: QueueId(7),
			cron_id: CronId(3),
			foreign_key_id: Some(4711),
			foreign_key: Some("product_id".to_string()),
			table_name: Some("products".to_string()),
			task_limit: 50,
			tasks_executed: 120,
			last_processed_id: Some(4711),
			is_running: false,
			start_time: Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap(),
			last_start: None,
			last_finish: None,
			job_type: "search_index".to_string(),
			name: Some("Rebuild search index".to_string()),
			frequency_hours: 6,
			anchor_time: NaiveTime::from_hms_opt(2, 0, 0),
			start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
			next_start: None,
		}
	}
}
