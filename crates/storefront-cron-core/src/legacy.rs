// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Compatibility adapter for the legacy combined cron/queue record.
//!
//! Older call sites exchange a single record that mixes definition and queue
//! fields under their historical names (`nLimitN` is the executed count,
//! `nLimitM` the per-run limit). This type only translates at the boundary;
//! the scheduler itself works on [`QueueEntry`] and [`CronDefinition`].
//!
//! [`CronDefinition`]: crate::CronDefinition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{Progress, QueueEntry};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyCronRow {
	#[serde(rename = "cronID")]
	pub cron_id: i64,
	#[serde(rename = "jobQueueID")]
	pub queue_id: Option<i64>,
	#[serde(rename = "jobType")]
	pub job_type: String,
	#[serde(rename = "foreignKeyID")]
	pub foreign_key_id: Option<i64>,
	#[serde(rename = "foreignKey")]
	pub foreign_key: Option<String>,
	#[serde(rename = "tableName")]
	pub table_name: Option<String>,
	#[serde(rename = "nLimitN")]
	pub executed: u32,
	#[serde(rename = "nLimitM")]
	pub limit: u32,
	#[serde(rename = "lastProcessedID")]
	pub last_processed_id: Option<i64>,
	#[serde(rename = "isRunning", with = "int_bool")]
	pub is_running: bool,
	#[serde(rename = "frequency")]
	pub frequency_hours: u32,
	#[serde(rename = "startTime")]
	pub start_time: DateTime<Utc>,
	#[serde(rename = "lastStart")]
	pub last_start: Option<DateTime<Utc>>,
}

impl From<&QueueEntry> for LegacyCronRow {
	fn from(entry: &QueueEntry) -> Self {
		Self {
			cron_id: entry.cron_id.0,
			queue_id: Some(entry.id.0),
			job_type: entry.job_type.clone(),
			foreign_key_id: entry.foreign_key_id,
			foreign_key: entry.foreign_key.clone(),
			table_name: entry.table_name.clone(),
			executed: entry.tasks_executed,
			limit: entry.task_limit,
			last_processed_id: entry.last_processed_id,
			is_running: entry.is_running,
			frequency_hours: entry.frequency_hours,
			start_time: entry.start_time,
			last_start: entry.last_start,
		}
	}
}

impl LegacyCronRow {
	/// Progress counters carried by this row, under their canonical names.
	pub fn progress(&self) -> Progress {
		Progress {
			task_limit: self.limit,
			tasks_executed: self.executed,
			last_processed_id: self.last_processed_id,
		}
	}
}

/// Legacy rows store flags as 0/1 integers.
mod int_bool {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u8(u8::from(*value))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
		Ok(u8::deserialize(deserializer)? != 0)
	}
}
