// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Helpers for tests that need a scheduler database.

use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;

use crate::repository::SqliteCronStore;
use crate::schema::ensure_schema;

/// A single-connection in-memory pool; every connection to `:memory:` would
/// otherwise see its own empty database.
pub async fn create_test_pool() -> SqlitePool {
	let options = SqliteConnectOptions::from_str("sqlite::memory:")
		.unwrap()
		.foreign_keys(true);
	SqlitePoolOptions::new()
		.max_connections(1)
		.connect_with(options)
		.await
		.unwrap()
}

pub async fn create_cron_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	ensure_schema(&pool).await.unwrap();
	pool
}

pub async fn create_test_store() -> Arc<SqliteCronStore> {
	Arc::new(SqliteCronStore::new(create_cron_test_pool().await))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
	NaiveDate::from_ymd_opt(y, m, d).unwrap()
}
