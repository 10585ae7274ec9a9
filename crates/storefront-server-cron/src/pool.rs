// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use std::str::FromStr;

use crate::error::JobError;

/// Create a SqlitePool with WAL mode and foreign keys enabled.
///
/// # Arguments
/// * `database_url` - SQLite connection string (e.g., "sqlite:./storefront.db")
///
/// # Errors
/// Returns `JobError::Internal` if the URL is invalid, or `JobError::Database`
/// if the connection fails.
#[tracing::instrument(skip(database_url))]
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, JobError> {
	let options = SqliteConnectOptions::from_str(database_url)
		.map_err(|e| JobError::Internal(format!("Invalid database URL: {e}")))?
		.journal_mode(SqliteJournalMode::Wal)
		.synchronous(SqliteSynchronous::Normal)
		.foreign_keys(true)
		.create_if_missing(true);

	let pool = SqlitePool::connect_with(options).await?;

	tracing::debug!("database pool created");
	Ok(pool)
}
