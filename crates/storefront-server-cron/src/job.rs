// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The contract every job type implements.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;

use storefront_cron_core::job_type;
use storefront_cron_core::{CronId, Progress, QueueEntry, QueueId};

use crate::context::JobContext;
use crate::error::{JobError, Result};
use crate::hydrator::ProgressHydrator;
use crate::repository::{NewQueueEntry, ProgressKey};

/// Runtime state of one job execution, rebuilt from its queue entry on every
/// run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobState {
	pub job_type: String,
	pub name: Option<String>,
	pub cron_id: Option<CronId>,
	pub queue_id: Option<QueueId>,

	/// Tasks this job may process in one run.
	pub limit: u32,
	/// Tasks processed so far across runs.
	pub executed: u32,
	pub last_processed_id: Option<i64>,

	pub foreign_key_id: Option<i64>,
	pub foreign_key: Option<String>,
	pub table_name: Option<String>,

	pub start_time: Option<DateTime<Utc>>,
	pub start_date: Option<NaiveDate>,
	pub last_start: Option<DateTime<Utc>>,
	pub last_finish: Option<DateTime<Utc>>,
	pub next_start: Option<DateTime<Utc>>,
	pub frequency_hours: u32,
	pub anchor_time: Option<NaiveTime>,

	pub finished: bool,
	pub running: bool,
}

impl JobState {
	pub fn progress(&self) -> Progress {
		Progress {
			task_limit: self.limit,
			tasks_executed: self.executed,
			last_processed_id: self.last_processed_id,
		}
	}

	/// Record `count` more processed tasks, ending at `last_id`.
	pub fn advance(&mut self, count: u32, last_id: Option<i64>) {
		self.executed = self.executed.saturating_add(count);
		if last_id.is_some() {
			self.last_processed_id = last_id;
		}
	}

	pub fn is_permanent(&self) -> bool {
		job_type::is_permanent(&self.job_type)
	}
}

/// A job bound to one queue entry.
///
/// Implementors provide [`perform`](Job::perform), which does one bounded
/// slice of work and updates `executed`, `last_processed_id` and `finished` on
/// the state. The remaining lifecycle is shared.
#[async_trait]
pub trait Job: Send + Sync {
	fn state(&self) -> &JobState;

	fn state_mut(&mut self) -> &mut JobState;

	async fn perform(&mut self, entry: &QueueEntry, ctx: &JobContext) -> Result<()>;

	/// Stamp the start on the entry and its definition, then perform.
	async fn start(&mut self, entry: &QueueEntry, ctx: &JobContext) -> Result<()> {
		ctx.store.stamp_entry_start(entry.id, ctx.now).await?;
		ctx.store.stamp_definition_start(entry.cron_id, ctx.now).await?;
		self.state_mut().last_start = Some(ctx.now);

		self.perform(entry, ctx).await
	}

	/// Persist progress counters and clear the running flag.
	///
	/// Permanent job types are keyed by their definition, all others by the
	/// queue entry.
	async fn save_progress(&self, entry: &QueueEntry, ctx: &JobContext) -> Result<bool> {
		let key = if self.state().is_permanent() {
			ProgressKey::Definition(entry.cron_id)
		} else {
			ProgressKey::Entry(entry.id)
		};

		ctx.store.save_progress(key, &self.state().progress()).await
	}

	/// Insert a queue entry for this job's definition.
	async fn insert(&mut self, ctx: &JobContext) -> Result<QueueId> {
		let state = self.state();
		let cron_id = state
			.cron_id
			.ok_or_else(|| JobError::Internal("job has no cron definition".to_string()))?;

		let entry = NewQueueEntry {
			cron_id,
			foreign_key_id: state.foreign_key_id,
			foreign_key: state.foreign_key.clone(),
			table_name: state.table_name.clone(),
			progress: state.progress(),
			start_time: state.start_time.unwrap_or(ctx.now),
			last_start: state.last_start,
			last_finish: state.last_finish,
		};

		let id = ctx.store.insert_entry(&entry).await?.ok_or_else(|| {
			JobError::Internal(format!("cron definition {cron_id} already has a queue entry"))
		})?;
		self.state_mut().queue_id = Some(id);
		Ok(id)
	}

	/// Remove this job's queue entry. A job without one is left alone.
	async fn delete(&self, ctx: &JobContext) -> Result<bool> {
		match self.state().queue_id {
			Some(id) => ctx.store.delete_entry(id).await,
			None => Ok(false),
		}
	}

	fn hydrate(&mut self, record: &Value) -> Result<()> {
		ProgressHydrator::hydrate(self.state_mut(), record)
	}

	fn is_finished(&self) -> bool {
		self.state().finished
	}
}

/// Stand-in for job types nobody registered. It does nothing and never
/// finishes, so its entry survives until the type is registered again.
#[derive(Debug, Default)]
pub struct PlaceholderJob {
	state: JobState,
}

impl PlaceholderJob {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl Job for PlaceholderJob {
	fn state(&self) -> &JobState {
		&self.state
	}

	fn state_mut(&mut self) -> &mut JobState {
		&mut self.state
	}

	async fn perform(&mut self, _entry: &QueueEntry, _ctx: &JobContext) -> Result<()> {
		Ok(())
	}

	fn is_finished(&self) -> bool {
		false
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::queue::WorkQueueSettings;
	use crate::repository::CronStore;
	use crate::testing::{create_test_store, date};
	use chrono::TimeZone;
	use std::sync::Arc;
	use storefront_cron_core::job_type::MAIL_QUEUE;
	use storefront_cron_core::NewCronDefinition;

	struct CountingJob {
		state: JobState,
	}

	#[async_trait]
	impl Job for CountingJob {
		fn state(&self) -> &JobState {
			&self.state
		}

		fn state_mut(&mut self) -> &mut JobState {
			&mut self.state
		}

		async fn perform(&mut self, _entry: &QueueEntry, _ctx: &JobContext) -> Result<()> {
			let next = self.state.last_processed_id.unwrap_or(0) + i64::from(self.state.limit);
			self.state.advance(self.state.limit, Some(next));
			self.state.finished = self.state.executed >= 30;
			Ok(())
		}
	}

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
	}

	async fn setup(job_type: &str) -> (Arc<dyn CronStore>, QueueEntry, JobContext) {
		let store = create_test_store().await;
		let id = store
			.insert_definition(&NewCronDefinition::new(job_type, date(2024, 1, 1)).with_task_limit(10))
			.await
			.unwrap();
		let definition = store.get_definition(id).await.unwrap().unwrap();
		let queue_id = store
			.insert_entry(&NewQueueEntry::for_definition(&definition, 100, now()))
			.await
			.unwrap()
			.unwrap();
		let entry = store.get_entry(queue_id).await.unwrap().unwrap();

		let store: Arc<dyn CronStore> = store;
		let ctx = JobContext::new(store.clone(), WorkQueueSettings::default(), now(), "run-1");
		(store, entry, ctx)
	}

	fn hydrated(entry: &QueueEntry) -> CountingJob {
		let mut job = CountingJob {
			state: JobState::default(),
		};
		job.hydrate(&entry.to_record().unwrap()).unwrap();
		job
	}

	#[tokio::test]
	async fn test_start_stamps_entry_and_definition() {
		let (store, entry, ctx) = setup("export").await;
		let mut job = hydrated(&entry);

		job.start(&entry, &ctx).await.unwrap();

		let stored = store.get_entry(entry.id).await.unwrap().unwrap();
		assert_eq!(stored.last_start, Some(now()));
		let definition = store.get_definition(entry.cron_id).await.unwrap().unwrap();
		assert_eq!(definition.last_start, Some(now()));
		assert_eq!(job.state().executed, 10);
		assert!(!job.is_finished());
	}

	#[tokio::test]
	async fn test_save_progress_persists_counters() {
		let (store, entry, ctx) = setup("export").await;
		let mut job = hydrated(&entry);
		job.start(&entry, &ctx).await.unwrap();
		job.start(&entry, &ctx).await.unwrap();

		assert!(job.save_progress(&entry, &ctx).await.unwrap());

		let stored = store.get_entry(entry.id).await.unwrap().unwrap();
		assert_eq!(stored.tasks_executed, 20);
		assert_eq!(stored.last_processed_id, Some(20));
		assert!(!stored.is_running);
	}

	#[tokio::test]
	async fn test_permanent_job_saves_by_definition() {
		let (store, entry, ctx) = setup(MAIL_QUEUE).await;
		let mut job = hydrated(&entry);
		job.state_mut().queue_id = None;
		job.start(&entry, &ctx).await.unwrap();

		assert!(job.save_progress(&entry, &ctx).await.unwrap());
		let stored = store.get_entry(entry.id).await.unwrap().unwrap();
		assert_eq!(stored.tasks_executed, 10);
	}

	#[tokio::test]
	async fn test_delete_and_reinsert() {
		let (store, entry, ctx) = setup("export").await;
		let mut job = hydrated(&entry);

		assert!(job.delete(&ctx).await.unwrap());
		assert!(store.get_entry(entry.id).await.unwrap().is_none());

		let id = job.insert(&ctx).await.unwrap();
		let stored = store.get_entry(id).await.unwrap().unwrap();
		assert_eq!(stored.cron_id, entry.cron_id);
		assert_eq!(stored.task_limit, 10);
		assert!(stored.last_finish.is_none());

		assert!(job.insert(&ctx).await.is_err());
	}

	#[tokio::test]
	async fn test_delete_without_entry_is_inert() {
		let (_store, _entry, ctx) = setup("export").await;
		let job = PlaceholderJob::new();
		assert!(!job.delete(&ctx).await.unwrap());
	}

	#[tokio::test]
	async fn test_placeholder_never_finishes() {
		let (_store, entry, ctx) = setup("retired_type").await;
		let mut job = PlaceholderJob::new();
		job.hydrate(&entry.to_record().unwrap()).unwrap();
		job.state_mut().finished = true;

		job.start(&entry, &ctx).await.unwrap();
		assert!(!job.is_finished());
		assert_eq!(job.state().job_type, "retired_type");
	}
}
