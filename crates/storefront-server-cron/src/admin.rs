// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Administrative operations on cron definitions.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use storefront_cron_core::job_type;
use storefront_cron_core::{CronDefinition, CronId, LegacyCronRow, NewCronDefinition, QueueId};

use crate::error::{JobError, Result};
use crate::health::DefinitionStatus;
use crate::repository::{CronStore, ProgressKey};

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
	pub deleted: Vec<CronId>,
	/// Requested ids skipped because their job type is permanent.
	pub protected: Vec<CronId>,
	/// Requested ids that did not exist.
	pub missing: Vec<CronId>,
}

pub struct CronAdmin {
	store: Arc<dyn CronStore>,
}

impl CronAdmin {
	pub fn new(store: Arc<dyn CronStore>) -> Self {
		Self { store }
	}

	#[instrument(skip(self, definition), fields(job_type = %definition.job_type))]
	pub async fn create(&self, definition: &NewCronDefinition) -> Result<CronId> {
		definition.validate()?;
		let id = self.store.insert_definition(definition).await?;
		info!(cron_id = %id, "cron definition created");
		Ok(id)
	}

	pub async fn list(&self) -> Result<Vec<CronDefinition>> {
		self.store.list_definitions().await
	}

	pub async fn get(&self, id: CronId) -> Result<CronDefinition> {
		self
			.store
			.get_definition(id)
			.await?
			.ok_or(JobError::DefinitionNotFound(id))
	}

	#[instrument(skip(self, ids), fields(requested = ids.len()))]
	pub async fn delete_by_ids(&self, ids: &[CronId]) -> Result<DeleteReport> {
		let requested: HashSet<CronId> = ids.iter().copied().collect();
		let found: Vec<CronDefinition> = self
			.store
			.list_definitions()
			.await?
			.into_iter()
			.filter(|definition| requested.contains(&definition.id))
			.collect();

		let found_ids: HashSet<CronId> = found.iter().map(|definition| definition.id).collect();
		let mut missing: Vec<CronId> = requested.difference(&found_ids).copied().collect();
		missing.sort_unstable();

		let (deletable, protected) =
			job_type::partition_permanent(found, |definition| definition.job_type.as_str());
		let protected: Vec<CronId> = protected.iter().map(|definition| definition.id).collect();
		if !protected.is_empty() {
			warn!(protected = ?protected, "skipping permanent cron definitions");
		}

		let deletable: Vec<CronId> = deletable.iter().map(|definition| definition.id).collect();
		let deleted = self.store.delete_definitions(&deletable).await?;
		info!(deleted = deleted.len(), "cron definitions deleted");

		Ok(DeleteReport {
			deleted,
			protected,
			missing,
		})
	}

	#[instrument(skip(self))]
	pub async fn delete_by_type(&self, job_type: &str) -> Result<DeleteReport> {
		if job_type::is_permanent(job_type) {
			let protected: Vec<CronId> = self
				.store
				.list_definitions()
				.await?
				.into_iter()
				.filter(|definition| definition.job_type == job_type)
				.map(|definition| definition.id)
				.collect();
			warn!(job_type, "refusing to delete permanent job type");
			return Ok(DeleteReport {
				protected,
				..DeleteReport::default()
			});
		}

		let deleted = self.store.delete_definitions_by_type(job_type).await?;
		info!(job_type, deleted = deleted.len(), "cron definitions deleted by type");
		Ok(DeleteReport {
			deleted,
			..DeleteReport::default()
		})
	}

	/// Arm a definition to become due at `at`, or at `now` if `at` has passed.
	#[instrument(skip(self), fields(cron_id = %id))]
	pub async fn rearm(
		&self,
		id: CronId,
		at: DateTime<Utc>,
		now: DateTime<Utc>,
	) -> Result<DateTime<Utc>> {
		let next = at.max(now);
		if !self.store.set_next_start(id, Some(next)).await? {
			return Err(JobError::DefinitionNotFound(id));
		}
		info!(next_start = %next, "cron definition re-armed");
		Ok(next)
	}

	pub async fn status(
		&self,
		now: DateTime<Utc>,
		stuck_threshold: Duration,
	) -> Result<Vec<DefinitionStatus>> {
		let definitions = self.store.list_definitions().await?;
		let entries: HashMap<CronId, _> = self
			.store
			.list_entries()
			.await?
			.into_iter()
			.map(|entry| (entry.cron_id, entry))
			.collect();

		Ok(definitions
			.into_iter()
			.map(|definition| {
				let entry = entries.get(&definition.id);
				DefinitionStatus::new(definition, entry, now, stuck_threshold)
			})
			.collect())
	}

	/// All queue entries in the legacy combined-row shape.
	pub async fn export_legacy(&self) -> Result<Vec<LegacyCronRow>> {
		Ok(self
			.store
			.list_entries()
			.await?
			.iter()
			.map(LegacyCronRow::from)
			.collect())
	}

	/// Apply progress counters from legacy rows onto their queue entries.
	/// Rows without a queue id, or whose entry is gone, are skipped. Updated
	/// entries come back idle.
	#[instrument(skip(self, rows), fields(rows = rows.len()))]
	pub async fn import_legacy(&self, rows: &[LegacyCronRow]) -> Result<usize> {
		let mut applied = 0;
		for row in rows {
			let Some(queue_id) = row.queue_id else {
				continue;
			};
			if self
				.store
				.save_progress(ProgressKey::Entry(QueueId(queue_id)), &row.progress())
				.await?
			{
				applied += 1;
			}
		}
		info!(applied, "legacy progress imported");
		Ok(applied)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::health::QueueState;
	use crate::repository::NewQueueEntry;
	use crate::testing::{create_test_store, date};
	use chrono::TimeZone;
	use storefront_cron_core::job_type::{LICENSE_CHECK, MAIL_QUEUE};

	fn now() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
	}

	async fn admin() -> (CronAdmin, Arc<dyn CronStore>) {
		let store: Arc<dyn CronStore> = create_test_store().await;
		(CronAdmin::new(store.clone()), store)
	}

	async fn enqueue(store: &Arc<dyn CronStore>, id: CronId) -> QueueId {
		let definition = store.get_definition(id).await.unwrap().unwrap();
		store
			.insert_entry(&NewQueueEntry::for_definition(&definition, 10, now()))
			.await
			.unwrap()
			.unwrap()
	}

	#[tokio::test]
	async fn test_create_validates() {
		let (admin, _) = admin().await;
		assert!(admin
			.create(&NewCronDefinition::new("Not A Tag", date(2024, 1, 1)))
			.await
			.is_err());
		let id = admin
			.create(&NewCronDefinition::new("export", date(2024, 1, 1)))
			.await
			.unwrap();
		assert_eq!(admin.get(id).await.unwrap().job_type, "export");
		assert!(matches!(
			admin.get(CronId(99)).await,
			Err(JobError::DefinitionNotFound(CronId(99)))
		));
	}

	#[tokio::test]
	async fn test_delete_by_ids_reports_protected_and_missing() {
		let (admin, _) = admin().await;
		let license = admin
			.create(&NewCronDefinition::new(LICENSE_CHECK, date(2024, 1, 1)))
			.await
			.unwrap();
		let export = admin
			.create(&NewCronDefinition::new("export", date(2024, 1, 1)))
			.await
			.unwrap();
		let import = admin
			.create(&NewCronDefinition::new("import", date(2024, 1, 1)))
			.await
			.unwrap();

		let report = admin
			.delete_by_ids(&[license, export, import, CronId(404)])
			.await
			.unwrap();
		assert_eq!(report.deleted, vec![export, import]);
		assert_eq!(report.protected, vec![license]);
		assert_eq!(report.missing, vec![CronId(404)]);

		let remaining = admin.list().await.unwrap();
		assert_eq!(remaining.len(), 1);
		assert_eq!(remaining[0].id, license);
	}

	#[tokio::test]
	async fn test_delete_by_type() {
		let (admin, _) = admin().await;
		let mail = admin
			.create(&NewCronDefinition::new(MAIL_QUEUE, date(2024, 1, 1)))
			.await
			.unwrap();
		admin
			.create(&NewCronDefinition::new("export", date(2024, 1, 1)))
			.await
			.unwrap();
		admin
			.create(&NewCronDefinition::new("export", date(2024, 1, 1)))
			.await
			.unwrap();

		let report = admin.delete_by_type(MAIL_QUEUE).await.unwrap();
		assert!(report.deleted.is_empty());
		assert_eq!(report.protected, vec![mail]);

		let report = admin.delete_by_type("export").await.unwrap();
		assert_eq!(report.deleted.len(), 2);
		assert_eq!(admin.list().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_rearm_never_in_past() {
		let (admin, _) = admin().await;
		let id = admin
			.create(&NewCronDefinition::new("export", date(2024, 1, 1)).with_frequency(0))
			.await
			.unwrap();

		let past = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		assert_eq!(admin.rearm(id, past, now()).await.unwrap(), now());

		let future = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
		assert_eq!(admin.rearm(id, future, now()).await.unwrap(), future);
		assert_eq!(admin.get(id).await.unwrap().next_start, Some(future));

		assert!(admin.rearm(CronId(77), future, now()).await.is_err());
	}

	#[tokio::test]
	async fn test_status_reports_queue_state() {
		let (admin, store) = admin().await;
		let idle = admin
			.create(&NewCronDefinition::new("idle", date(2024, 1, 1)))
			.await
			.unwrap();
		let queued = admin
			.create(&NewCronDefinition::new("queued", date(2024, 1, 1)))
			.await
			.unwrap();
		let stuck = admin
			.create(&NewCronDefinition::new("stuck", date(2024, 1, 1)))
			.await
			.unwrap();
		enqueue(&store, queued).await;
		let stuck_entry = enqueue(&store, stuck).await;
		store
			.mark_entry_running(stuck_entry, now() - Duration::hours(3))
			.await
			.unwrap();

		let status = admin.status(now(), Duration::hours(1)).await.unwrap();
		let state_of = |id: CronId| {
			status
				.iter()
				.find(|s| s.definition.id == id)
				.map(|s| s.state)
				.unwrap()
		};
		assert_eq!(state_of(idle), QueueState::Idle);
		assert_eq!(state_of(queued), QueueState::Queued);
		assert_eq!(state_of(stuck), QueueState::Stuck);
	}

	#[tokio::test]
	async fn test_legacy_export_import() {
		let (admin, store) = admin().await;
		let id = admin
			.create(&NewCronDefinition::new("export", date(2024, 1, 1)))
			.await
			.unwrap();
		let queue_id = enqueue(&store, id).await;

		let mut rows = admin.export_legacy().await.unwrap();
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].queue_id, Some(queue_id.0));
		assert_eq!(rows[0].limit, 10);

		rows[0].executed = 42;
		rows[0].last_processed_id = Some(42);
		rows.push(LegacyCronRow {
			queue_id: None,
			..rows[0].clone()
		});

		assert_eq!(admin.import_legacy(&rows).await.unwrap(), 1);
		let entry = store.get_entry(queue_id).await.unwrap().unwrap();
		assert_eq!(entry.tasks_executed, 42);
		assert_eq!(entry.last_processed_id, Some(42));
	}
}
