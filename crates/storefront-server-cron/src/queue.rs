// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The scheduler run cycle.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use storefront_cron_core::{next_start, QueueEntry};

use crate::builder::JobBuilder;
use crate::context::JobContext;
use crate::error::Result;
use crate::lock::ProcessLock;
use crate::repository::{CronStore, NewQueueEntry};

/// Returned by [`RunOutcome::code`] when another run holds the lock.
pub const ALREADY_RUNNING: i64 = -1;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct WorkQueueSettings {
	/// Maximum entries processed per run.
	pub job_limit: usize,
	/// Running entries older than this are presumed crashed.
	pub stuck_threshold: Duration,
	/// Zone anchor times and start dates are interpreted in.
	pub timezone: Tz,
	/// Task limit for new entries whose definition sets none.
	pub default_task_limit: u32,
}

impl Default for WorkQueueSettings {
	fn default() -> Self {
		Self {
			job_limit: 10,
			stuck_threshold: Duration::hours(1),
			timezone: Tz::UTC,
			default_task_limit: 100,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
	AlreadyRunning,
	Processed(usize),
}

impl RunOutcome {
	pub fn code(&self) -> i64 {
		match self {
			RunOutcome::AlreadyRunning => ALREADY_RUNNING,
			RunOutcome::Processed(count) => *count as i64,
		}
	}
}

pub struct WorkQueue {
	store: Arc<dyn CronStore>,
	builder: JobBuilder,
	settings: WorkQueueSettings,
	clock: Clock,
}

impl WorkQueue {
	pub fn new(store: Arc<dyn CronStore>, builder: JobBuilder, settings: WorkQueueSettings) -> Self {
		Self {
			store,
			builder,
			settings,
			clock: Arc::new(Utc::now),
		}
	}

	/// Read the current instant from `clock` instead of the system clock.
	pub fn with_clock<F>(mut self, clock: F) -> Self
	where
		F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
	{
		self.clock = Arc::new(clock);
		self
	}

	fn now(&self) -> DateTime<Utc> {
		(self.clock)()
	}

	/// Run one scheduler cycle under `lock`.
	///
	/// The lock is released before any error is returned.
	pub async fn run(&self, lock: &mut ProcessLock) -> Result<RunOutcome> {
		if lock.is_locked() {
			info!(path = %lock.path().display(), "scheduler already running, skipping");
			return Ok(RunOutcome::AlreadyRunning);
		}
		if !lock.lock() {
			info!(path = %lock.path().display(), "lost race for scheduler lock, skipping");
			return Ok(RunOutcome::AlreadyRunning);
		}

		let result = self.run_locked(lock).await;
		lock.unlock();
		result
	}

	#[instrument(skip(self, lock), fields(run_id = tracing::field::Empty))]
	async fn run_locked(&self, lock: &ProcessLock) -> Result<RunOutcome> {
		let run_id = uuid::Uuid::new_v4().to_string();
		tracing::Span::current().record("run_id", run_id.as_str());

		let now = self.now();
		self.enqueue_due(lock, now).await?;
		self.unstick(now).await?;

		let mut entries = self.store.list_runnable_entries(now).await?;
		let runnable = entries.len();
		entries.shuffle(&mut rand::thread_rng());
		entries.truncate(self.settings.job_limit);
		debug!(runnable, selected = entries.len(), "loaded runnable entries");

		for entry in &entries {
			self.process(entry, &run_id).await?;
		}

		info!(processed = entries.len(), "scheduler run complete");
		Ok(RunOutcome::Processed(entries.len()))
	}

	async fn enqueue_due(&self, lock: &ProcessLock, now: DateTime<Utc>) -> Result<()> {
		let due = lock.check(now, &self.settings.timezone).await?;
		let mut enqueued = 0usize;
		for definition in &due {
			let entry = NewQueueEntry::for_definition(definition, self.settings.default_task_limit, now);
			if self.store.insert_entry(&entry).await?.is_some() {
				enqueued += 1;
			}
		}
		if enqueued > 0 {
			info!(enqueued, "enqueued due cron definitions");
		}
		Ok(())
	}

	async fn unstick(&self, now: DateTime<Utc>) -> Result<()> {
		let reclaimed = self
			.store
			.unstick_entries(now, self.settings.stuck_threshold)
			.await?;
		if reclaimed > 0 {
			warn!(reclaimed, "reclaimed stuck queue entries");
		}
		Ok(())
	}

	#[instrument(skip(self, entry), fields(queue_id = %entry.id, cron_id = %entry.cron_id, job_type = %entry.job_type))]
	async fn process(&self, entry: &QueueEntry, run_id: &str) -> Result<()> {
		let mut job = self.builder.create(entry)?;

		let started = self.now();
		self.store.mark_entry_running(entry.id, started).await?;
		job.state_mut().running = true;

		let ctx = JobContext::new(self.store.clone(), self.settings.clone(), started, run_id);
		let outcome = job.start(entry, &ctx).await;
		job.state_mut().running = false;

		// `last_start` keeps the start instant; only `last_finish` is stamped here.
		let finished = self.now();
		self.store.release_entry(entry.id, finished).await?;
		let ctx = ctx.at(finished);

		match outcome {
			Err(e) if e.is_persistence() => {
				job.save_progress(entry, &ctx).await?;
				return Err(e);
			}
			Err(e) => warn!(error = %e, "job failed, keeping entry for retry"),
			Ok(()) => {}
		}

		let next = next_start(
			entry.anchor(),
			entry.frequency_hours,
			finished,
			&self.settings.timezone,
		)?;
		self
			.store
			.record_definition_finish(entry.cron_id, finished, next)
			.await?;

		if !job.save_progress(entry, &ctx).await? {
			debug!("no queue entry matched progress save");
		}

		if job.is_finished() {
			job.delete(&ctx).await?;
			info!(next_start = %next, "job finished, queue entry removed");
		} else {
			info!(
				next_start = %next,
				executed = job.state().executed,
				"job paused, queue entry kept"
			);
		}

		Ok(())
	}
}
