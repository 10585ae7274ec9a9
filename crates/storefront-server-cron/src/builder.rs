// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use storefront_cron_core::QueueEntry;
use tracing::instrument;

use crate::error::Result;
use crate::job::Job;
use crate::registry::JobTypeRegistry;

/// Turns queue entries into hydrated, ready-to-run jobs.
#[derive(Debug, Clone)]
pub struct JobBuilder {
	registry: Arc<JobTypeRegistry>,
}

impl JobBuilder {
	pub fn new(registry: Arc<JobTypeRegistry>) -> Self {
		Self { registry }
	}

	#[instrument(skip(self, entry), fields(queue_id = %entry.id, job_type = %entry.job_type))]
	pub fn create(&self, entry: &QueueEntry) -> Result<Box<dyn Job>> {
		let mut job = self.registry.resolve(&entry.job_type);
		job.hydrate(&entry.to_record()?)?;
		Ok(job)
	}
}
