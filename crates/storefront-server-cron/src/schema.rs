// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule store schema.
//!
//! Timestamps are RFC 3339 UTC text with a fixed microsecond precision so
//! that SQL string comparison orders them chronologically. Missing values are
//! NULL.

use sqlx::SqlitePool;

use crate::error::Result;

const CREATE_CRON_DEFINITIONS: &str = r#"
	CREATE TABLE IF NOT EXISTS cron_definitions (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		job_type TEXT NOT NULL,
		name TEXT,
		frequency_hours INTEGER NOT NULL DEFAULT 24,
		start_date TEXT NOT NULL,
		anchor_time TEXT,
		foreign_key_id INTEGER,
		foreign_key TEXT,
		table_name TEXT,
		task_limit INTEGER,
		last_start TEXT,
		last_finish TEXT,
		next_start TEXT
	)
"#;

const CREATE_QUEUE_ENTRIES: &str = r#"
	CREATE TABLE IF NOT EXISTS queue_entries (
		id INTEGER PRIMARY KEY AUTOINCREMENT,
		cron_id INTEGER NOT NULL UNIQUE REFERENCES cron_definitions(id) ON DELETE CASCADE,
		foreign_key_id INTEGER,
		foreign_key TEXT,
		table_name TEXT,
		task_limit INTEGER NOT NULL DEFAULT 0,
		tasks_executed INTEGER NOT NULL DEFAULT 0,
		last_processed_id INTEGER,
		is_running INTEGER NOT NULL DEFAULT 0,
		start_time TEXT NOT NULL,
		last_start TEXT,
		last_finish TEXT
	)
"#;

const CREATE_QUEUE_RUNNABLE_INDEX: &str =
	"CREATE INDEX IF NOT EXISTS idx_queue_entries_runnable ON queue_entries(is_running, start_time)";

/// Create the scheduler tables if they do not exist.
#[tracing::instrument(skip(pool))]
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
	for statement in [
		CREATE_CRON_DEFINITIONS,
		CREATE_QUEUE_ENTRIES,
		CREATE_QUEUE_RUNNABLE_INDEX,
	] {
		sqlx::query(statement).execute(pool).await?;
	}

	tracing::debug!("cron schema ensured");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::create_test_pool;

	#[tokio::test]
	async fn test_ensure_schema_is_idempotent() {
		let pool = create_test_pool().await;
		ensure_schema(&pool).await.unwrap();
		ensure_schema(&pool).await.unwrap();

		let tables: Vec<(String,)> = sqlx::query_as(
			"SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('cron_definitions', 'queue_entries') ORDER BY name",
		)
		.fetch_all(&pool)
		.await
		.unwrap();
		assert_eq!(tables.len(), 2);
	}
}
