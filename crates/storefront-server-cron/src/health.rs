// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

use storefront_cron_core::{CronDefinition, Progress, QueueEntry, QueueId};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
	/// No queue entry.
	Idle,
	Queued,
	Running,
	/// Running past the stuck threshold; the next run reclaims it.
	Stuck,
}

impl fmt::Display for QueueState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			QueueState::Idle => "idle",
			QueueState::Queued => "queued",
			QueueState::Running => "running",
			QueueState::Stuck => "stuck",
		};
		write!(f, "{s}")
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct DefinitionStatus {
	pub definition: CronDefinition,
	pub state: QueueState,
	pub entry_id: Option<QueueId>,
	pub progress: Option<Progress>,
}

impl DefinitionStatus {
	pub fn new(
		definition: CronDefinition,
		entry: Option<&QueueEntry>,
		now: DateTime<Utc>,
		stuck_threshold: Duration,
	) -> Self {
		Self {
			state: determine_queue_state(entry, now, stuck_threshold),
			entry_id: entry.map(|e| e.id),
			progress: entry.map(QueueEntry::progress),
			definition,
		}
	}
}

/// Uses the same predicate as the reclaim sweep.
pub fn determine_queue_state(
	entry: Option<&QueueEntry>,
	now: DateTime<Utc>,
	stuck_threshold: Duration,
) -> QueueState {
	match entry {
		None => QueueState::Idle,
		Some(entry) if !entry.is_running => QueueState::Queued,
		Some(entry) => match entry.last_start {
			Some(started) if entry.start_time <= now && now - started > stuck_threshold => {
				QueueState::Stuck
			}
			_ => QueueState::Running,
		},
	}
}
