// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Repository layer for the schedule store.
//!
//! Every method is a single atomic write or read. No transaction spans more
//! than one logical step of a run.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, SecondsFormat, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::instrument;

use storefront_cron_core::job_type;
use storefront_cron_core::{
	CronDefinition, CronId, NewCronDefinition, Progress, QueueEntry, QueueId,
};

use crate::error::{JobError, Result};

/// Which row a progress save is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKey {
	/// The queue entry owned by this definition. Used by permanent job types.
	Definition(CronId),
	Entry(QueueId),
}

/// Input for inserting a queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQueueEntry {
	pub cron_id: CronId,
	pub foreign_key_id: Option<i64>,
	pub foreign_key: Option<String>,
	pub table_name: Option<String>,
	pub progress: Progress,
	pub start_time: DateTime<Utc>,
	pub last_start: Option<DateTime<Utc>>,
	pub last_finish: Option<DateTime<Utc>>,
}

impl NewQueueEntry {
	/// A fresh, idle entry for a newly due definition with zeroed counters.
	pub fn for_definition(
		definition: &CronDefinition,
		default_task_limit: u32,
		now: DateTime<Utc>,
	) -> Self {
		Self {
			cron_id: definition.id,
			foreign_key_id: definition.foreign_key_id,
			foreign_key: definition.foreign_key.clone(),
			table_name: definition.table_name.clone(),
			progress: Progress {
				task_limit: definition.task_limit.unwrap_or(default_task_limit),
				tasks_executed: 0,
				last_processed_id: None,
			},
			start_time: now,
			last_start: None,
			last_finish: None,
		}
	}
}

#[async_trait]
pub trait CronStore: Send + Sync {
	// Definitions
	async fn insert_definition(&self, definition: &NewCronDefinition) -> Result<CronId>;
	async fn get_definition(&self, id: CronId) -> Result<Option<CronDefinition>>;
	async fn list_definitions(&self) -> Result<Vec<CronDefinition>>;
	/// Definitions that have no queue entry, whether due or not.
	async fn list_unqueued_definitions(&self) -> Result<Vec<CronDefinition>>;
	async fn stamp_definition_start(&self, id: CronId, at: DateTime<Utc>) -> Result<()>;
	async fn record_definition_finish(
		&self,
		id: CronId,
		finished_at: DateTime<Utc>,
		next_start: DateTime<Utc>,
	) -> Result<()>;
	async fn set_next_start(&self, id: CronId, next_start: Option<DateTime<Utc>>) -> Result<bool>;
	/// Delete definitions and their queue entries. Permanent job types are
	/// never deleted. Returns the ids actually removed.
	async fn delete_definitions(&self, ids: &[CronId]) -> Result<Vec<CronId>>;
	async fn delete_definitions_by_type(&self, job_type: &str) -> Result<Vec<CronId>>;

	// Queue entries
	/// Insert a queue entry. Returns `None` if the definition already has one.
	async fn insert_entry(&self, entry: &NewQueueEntry) -> Result<Option<QueueId>>;
	async fn get_entry(&self, id: QueueId) -> Result<Option<QueueEntry>>;
	async fn list_entries(&self) -> Result<Vec<QueueEntry>>;
	/// Idle entries whose start time has passed.
	async fn list_runnable_entries(&self, now: DateTime<Utc>) -> Result<Vec<QueueEntry>>;
	/// Reset entries left running longer than `threshold`. Progress counters
	/// are kept.
	async fn unstick_entries(&self, now: DateTime<Utc>, threshold: Duration) -> Result<u64>;
	async fn mark_entry_running(&self, id: QueueId, at: DateTime<Utc>) -> Result<()>;
	async fn stamp_entry_start(&self, id: QueueId, at: DateTime<Utc>) -> Result<()>;
	async fn release_entry(&self, id: QueueId, finished_at: DateTime<Utc>) -> Result<()>;
	/// Persist progress counters and clear the running flag.
	async fn save_progress(&self, key: ProgressKey, progress: &Progress) -> Result<bool>;
	async fn delete_entry(&self, id: QueueId) -> Result<bool>;
}

/// SQLite implementation of the schedule store.
#[derive(Clone)]
pub struct SqliteCronStore {
	pool: SqlitePool,
}

impl SqliteCronStore {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	async fn delete_definition_rows(&self, ids: Vec<i64>) -> Result<Vec<CronId>> {
		let mut tx = self.pool.begin().await?;
		for id in &ids {
			sqlx::query("DELETE FROM queue_entries WHERE cron_id = ?")
				.bind(id)
				.execute(&mut *tx)
				.await?;
			sqlx::query("DELETE FROM cron_definitions WHERE id = ?")
				.bind(id)
				.execute(&mut *tx)
				.await?;
		}
		tx.commit().await?;

		Ok(ids.into_iter().map(CronId).collect())
	}
}

const DEFINITION_COLUMNS: &str = r#"
	SELECT id, job_type, name, frequency_hours, start_date, anchor_time,
		   foreign_key_id, foreign_key, table_name, task_limit,
		   last_start, last_finish, next_start
	FROM cron_definitions
"#;

const ENTRY_COLUMNS: &str = r#"
	SELECT q.id, q.cron_id, q.foreign_key_id, q.foreign_key, q.table_name,
		   q.task_limit, q.tasks_executed, q.last_processed_id, q.is_running,
		   q.start_time, q.last_start, q.last_finish,
		   d.job_type, d.name, d.frequency_hours, d.anchor_time, d.start_date, d.next_start
	FROM queue_entries q
	JOIN cron_definitions d ON d.id = q.cron_id
"#;

#[async_trait]
impl CronStore for SqliteCronStore {
	#[instrument(skip(self, definition), fields(job_type = %definition.job_type))]
	async fn insert_definition(&self, definition: &NewCronDefinition) -> Result<CronId> {
		definition.validate()?;
		let result = sqlx::query(
			r#"
			INSERT INTO cron_definitions (
				job_type, name, frequency_hours, start_date, anchor_time,
				foreign_key_id, foreign_key, table_name, task_limit,
				last_start, last_finish, next_start
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL)
			"#,
		)
		.bind(&definition.job_type)
		.bind(&definition.name)
		.bind(i64::from(definition.frequency_hours))
		.bind(format_date(definition.start_date))
		.bind(definition.anchor_time.map(format_anchor))
		.bind(definition.foreign_key_id)
		.bind(&definition.foreign_key)
		.bind(&definition.table_name)
		.bind(definition.task_limit.map(i64::from))
		.execute(&self.pool)
		.await?;

		Ok(CronId(result.last_insert_rowid()))
	}

	#[instrument(skip(self), fields(cron_id = %id))]
	async fn get_definition(&self, id: CronId) -> Result<Option<CronDefinition>> {
		let row = sqlx::query_as::<_, DefinitionRow>(&format!("{DEFINITION_COLUMNS} WHERE id = ?"))
			.bind(id.0)
			.fetch_optional(&self.pool)
			.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self))]
	async fn list_definitions(&self) -> Result<Vec<CronDefinition>> {
		let rows = sqlx::query_as::<_, DefinitionRow>(&format!("{DEFINITION_COLUMNS} ORDER BY id"))
			.fetch_all(&self.pool)
			.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn list_unqueued_definitions(&self) -> Result<Vec<CronDefinition>> {
		let rows = sqlx::query_as::<_, DefinitionRow>(&format!(
			"{DEFINITION_COLUMNS} WHERE NOT EXISTS (SELECT 1 FROM queue_entries q WHERE q.cron_id = cron_definitions.id) ORDER BY id"
		))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(cron_id = %id))]
	async fn stamp_definition_start(&self, id: CronId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE cron_definitions SET last_start = ? WHERE id = ?")
			.bind(format_timestamp(at))
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(cron_id = %id, next_start = %next_start))]
	async fn record_definition_finish(
		&self,
		id: CronId,
		finished_at: DateTime<Utc>,
		next_start: DateTime<Utc>,
	) -> Result<()> {
		sqlx::query("UPDATE cron_definitions SET last_finish = ?, next_start = ? WHERE id = ?")
			.bind(format_timestamp(finished_at))
			.bind(format_timestamp(next_start))
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(cron_id = %id))]
	async fn set_next_start(&self, id: CronId, next_start: Option<DateTime<Utc>>) -> Result<bool> {
		let result = sqlx::query("UPDATE cron_definitions SET next_start = ? WHERE id = ?")
			.bind(next_start.map(format_timestamp))
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self, ids), fields(requested = ids.len()))]
	async fn delete_definitions(&self, ids: &[CronId]) -> Result<Vec<CronId>> {
		if ids.is_empty() {
			return Ok(Vec::new());
		}

		let mut builder = QueryBuilder::<Sqlite>::new("SELECT id FROM cron_definitions WHERE id IN (");
		let mut separated = builder.separated(", ");
		for id in ids {
			separated.push_bind(id.0);
		}
		separated.push_unseparated(") AND job_type NOT IN (");
		let mut tags = builder.separated(", ");
		for tag in job_type::PERMANENT {
			tags.push_bind(*tag);
		}
		tags.push_unseparated(") ORDER BY id");

		let deletable: Vec<(i64,)> = builder.build_query_as().fetch_all(&self.pool).await?;
		self
			.delete_definition_rows(deletable.into_iter().map(|(id,)| id).collect())
			.await
	}

	#[instrument(skip(self))]
	async fn delete_definitions_by_type(&self, job_type: &str) -> Result<Vec<CronId>> {
		if job_type::is_permanent(job_type) {
			return Ok(Vec::new());
		}

		let ids: Vec<(i64,)> =
			sqlx::query_as("SELECT id FROM cron_definitions WHERE job_type = ? ORDER BY id")
				.bind(job_type)
				.fetch_all(&self.pool)
				.await?;

		self
			.delete_definition_rows(ids.into_iter().map(|(id,)| id).collect())
			.await
	}

	#[instrument(skip(self, entry), fields(cron_id = %entry.cron_id))]
	async fn insert_entry(&self, entry: &NewQueueEntry) -> Result<Option<QueueId>> {
		let result = sqlx::query(
			r#"
			INSERT INTO queue_entries (
				cron_id, foreign_key_id, foreign_key, table_name,
				task_limit, tasks_executed, last_processed_id, is_running,
				start_time, last_start, last_finish
			)
			VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)
			ON CONFLICT(cron_id) DO NOTHING
			"#,
		)
		.bind(entry.cron_id.0)
		.bind(entry.foreign_key_id)
		.bind(&entry.foreign_key)
		.bind(&entry.table_name)
		.bind(i64::from(entry.progress.task_limit))
		.bind(i64::from(entry.progress.tasks_executed))
		.bind(entry.progress.last_processed_id)
		.bind(format_timestamp(entry.start_time))
		.bind(entry.last_start.map(format_timestamp))
		.bind(entry.last_finish.map(format_timestamp))
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Ok(None);
		}
		Ok(Some(QueueId(result.last_insert_rowid())))
	}

	#[instrument(skip(self), fields(queue_id = %id))]
	async fn get_entry(&self, id: QueueId) -> Result<Option<QueueEntry>> {
		let row = sqlx::query_as::<_, QueueEntryRow>(&format!("{ENTRY_COLUMNS} WHERE q.id = ?"))
			.bind(id.0)
			.fetch_optional(&self.pool)
			.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self))]
	async fn list_entries(&self) -> Result<Vec<QueueEntry>> {
		let rows = sqlx::query_as::<_, QueueEntryRow>(&format!("{ENTRY_COLUMNS} ORDER BY q.id"))
			.fetch_all(&self.pool)
			.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self))]
	async fn list_runnable_entries(&self, now: DateTime<Utc>) -> Result<Vec<QueueEntry>> {
		let rows = sqlx::query_as::<_, QueueEntryRow>(&format!(
			"{ENTRY_COLUMNS} WHERE q.is_running = 0 AND q.start_time <= ? ORDER BY q.id"
		))
		.bind(format_timestamp(now))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(threshold_secs = threshold.num_seconds()))]
	async fn unstick_entries(&self, now: DateTime<Utc>, threshold: Duration) -> Result<u64> {
		let result = sqlx::query(
			r#"
			UPDATE queue_entries
			SET is_running = 0
			WHERE is_running = 1
			  AND start_time <= ?
			  AND last_start IS NOT NULL
			  AND last_start < ?
			"#,
		)
		.bind(format_timestamp(now))
		.bind(format_timestamp(now - threshold))
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected())
	}

	#[instrument(skip(self), fields(queue_id = %id))]
	async fn mark_entry_running(&self, id: QueueId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE queue_entries SET is_running = 1, last_start = ? WHERE id = ?")
			.bind(format_timestamp(at))
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(queue_id = %id))]
	async fn stamp_entry_start(&self, id: QueueId, at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE queue_entries SET last_start = ? WHERE id = ?")
			.bind(format_timestamp(at))
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(queue_id = %id))]
	async fn release_entry(&self, id: QueueId, finished_at: DateTime<Utc>) -> Result<()> {
		sqlx::query("UPDATE queue_entries SET is_running = 0, last_finish = ? WHERE id = ?")
			.bind(format_timestamp(finished_at))
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		Ok(())
	}

	#[instrument(skip(self, progress))]
	async fn save_progress(&self, key: ProgressKey, progress: &Progress) -> Result<bool> {
		let (column, id) = match key {
			ProgressKey::Definition(id) => ("cron_id", id.0),
			ProgressKey::Entry(id) => ("id", id.0),
		};

		let result = sqlx::query(&format!(
			r#"
			UPDATE queue_entries
			SET task_limit = ?, tasks_executed = ?, last_processed_id = ?, is_running = 0
			WHERE {column} = ?
			"#
		))
		.bind(i64::from(progress.task_limit))
		.bind(i64::from(progress.tasks_executed))
		.bind(progress.last_processed_id)
		.bind(id)
		.execute(&self.pool)
		.await?;

		Ok(result.rows_affected() > 0)
	}

	#[instrument(skip(self), fields(queue_id = %id))]
	async fn delete_entry(&self, id: QueueId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM queue_entries WHERE id = ?")
			.bind(id.0)
			.execute(&self.pool)
			.await?;

		Ok(result.rows_affected() > 0)
	}
}

pub(crate) fn format_timestamp(dt: DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn format_date(date: NaiveDate) -> String {
	date.format("%Y-%m-%d").to_string()
}

fn format_anchor(anchor: NaiveTime) -> String {
	anchor.format("%H:%M:%S").to_string()
}

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| JobError::Internal(format!("Invalid {field}")))
}

fn parse_optional_timestamp(value: Option<String>, field: &str) -> Result<Option<DateTime<Utc>>> {
	value.map(|s| parse_timestamp(&s, field)).transpose()
}

fn parse_date(value: &str) -> Result<NaiveDate> {
	NaiveDate::parse_from_str(value, "%Y-%m-%d")
		.map_err(|_| JobError::Internal("Invalid start_date".to_string()))
}

fn parse_anchor_column(value: Option<String>) -> Result<Option<NaiveTime>> {
	value
		.map(|s| {
			NaiveTime::parse_from_str(&s, "%H:%M:%S")
				.map_err(|_| JobError::Internal("Invalid anchor_time".to_string()))
		})
		.transpose()
}

fn to_u32(value: i64, field: &str) -> Result<u32> {
	u32::try_from(value).map_err(|_| JobError::Internal(format!("Invalid {field}")))
}

#[derive(sqlx::FromRow)]
struct DefinitionRow {
	id: i64,
	job_type: String,
	name: Option<String>,
	frequency_hours: i64,
	start_date: String,
	anchor_time: Option<String>,
	foreign_key_id: Option<i64>,
	foreign_key: Option<String>,
	table_name: Option<String>,
	task_limit: Option<i64>,
	last_start: Option<String>,
	last_finish: Option<String>,
	next_start: Option<String>,
}

impl TryFrom<DefinitionRow> for CronDefinition {
	type Error = JobError;

	fn try_from(row: DefinitionRow) -> Result<Self> {
		Ok(CronDefinition {
			id: CronId(row.id),
			job_type: row.job_type,
			name: row.name,
			frequency_hours: to_u32(row.frequency_hours, "frequency_hours")?,
			start_date: parse_date(&row.start_date)?,
			anchor_time: parse_anchor_column(row.anchor_time)?,
			foreign_key_id: row.foreign_key_id,
			foreign_key: row.foreign_key,
			table_name: row.table_name,
			task_limit: row
				.task_limit
				.map(|limit| to_u32(limit, "task_limit"))
				.transpose()?,
			last_start: parse_optional_timestamp(row.last_start, "last_start")?,
			last_finish: parse_optional_timestamp(row.last_finish, "last_finish")?,
			next_start: parse_optional_timestamp(row.next_start, "next_start")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct QueueEntryRow {
	id: i64,
	cron_id: i64,
	foreign_key_id: Option<i64>,
	foreign_key: Option<String>,
	table_name: Option<String>,
	task_limit: i64,
	tasks_executed: i64,
	last_processed_id: Option<i64>,
	is_running: bool,
	start_time: String,
	last_start: Option<String>,
	last_finish: Option<String>,
	job_type: String,
	name: Option<String>,
	frequency_hours: i64,
	anchor_time: Option<String>,
	start_date: String,
	next_start: Option<String>,
}

impl TryFrom<QueueEntryRow> for QueueEntry {
	type Error = JobError;

	fn try_from(row: QueueEntryRow) -> Result<Self> {
		Ok(QueueEntry {
			id: QueueId(row.id),
			cron_id: CronId(row.cron_id),
			foreign_key_id: row.foreign_key_id,
			foreign_key: row.foreign_key,
			table_name: row.table_name,
			task_limit: to_u32(row.task_limit, "task_limit")?,
			tasks_executed: to_u32(row.tasks_executed, "tasks_executed")?,
			last_processed_id: row.last_processed_id,
			is_running: row.is_running,
			start_time: parse_timestamp(&row.start_time, "start_time")?,
			last_start: parse_optional_timestamp(row.last_start, "last_start")?,
			last_finish: parse_optional_timestamp(row.last_finish, "last_finish")?,
			job_type: row.job_type,
			name: row.name,
			frequency_hours: to_u32(row.frequency_hours, "frequency_hours")?,
			anchor_time: parse_anchor_column(row.anchor_time)?,
			start_date: parse_date(&row.start_date)?,
			next_start: parse_optional_timestamp(row.next_start, "next_start")?,
		})
	}
}
