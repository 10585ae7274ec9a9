// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::queue::WorkQueueSettings;
use crate::repository::CronStore;

/// Everything a job may touch while it runs. Jobs read configuration and the
/// current instant from here, never from process-wide state.
#[derive(Clone)]
pub struct JobContext {
	pub store: Arc<dyn CronStore>,
	pub settings: WorkQueueSettings,
	pub now: DateTime<Utc>,
	pub run_id: String,
}

impl JobContext {
	pub fn new(
		store: Arc<dyn CronStore>,
		settings: WorkQueueSettings,
		now: DateTime<Utc>,
		run_id: impl Into<String>,
	) -> Self {
		Self {
			store,
			settings,
			now,
			run_id: run_id.into(),
		}
	}

	/// The same context at a later instant.
	pub fn at(&self, now: DateTime<Utc>) -> Self {
		Self {
			now,
			..self.clone()
		}
	}
}
