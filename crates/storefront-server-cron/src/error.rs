// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use storefront_cron_core::{CronError, CronId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	Cron(#[from] CronError),

	#[error("cron definition not found: {0}")]
	DefinitionNotFound(CronId),

	#[error("cannot hydrate field '{field}': {message}")]
	Hydration { field: String, message: String },

	#[error("job failed: {0}")]
	Failed(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl JobError {
	/// Store and encoding failures. These abort a scheduler run instead of
	/// being recorded as a failed job.
	pub fn is_persistence(&self) -> bool {
		matches!(self, JobError::Database(_) | JobError::Serialization(_))
	}
}
