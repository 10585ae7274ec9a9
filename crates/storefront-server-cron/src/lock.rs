// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Process-wide exclusive ownership of the scheduler run.
//!
//! Backed by a non-blocking advisory lock on a well-known file. If the file
//! cannot be opened every operation fails and the lock reports itself as
//! held, so a broken filesystem never lets two runs overlap.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use storefront_cron_core::CronDefinition;

use crate::error::Result;
use crate::repository::CronStore;

pub struct ProcessLock {
	path: PathBuf,
	file: Option<File>,
	held: bool,
	store: Arc<dyn CronStore>,
}

impl ProcessLock {
	pub fn new(path: impl Into<PathBuf>, store: Arc<dyn CronStore>) -> Self {
		let path = path.into();
		let file = match OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(false)
			.open(&path)
		{
			Ok(file) => Some(file),
			Err(e) => {
				warn!(path = %path.display(), error = %e, "lock file unusable, treating scheduler as locked");
				None
			}
		};

		Self {
			path,
			file,
			held: false,
			store,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Probe whether some run holds the lock, without keeping it.
	///
	/// A lock held by this instance counts as locked.
	pub fn is_locked(&self) -> bool {
		if self.held {
			return true;
		}
		let Some(file) = &self.file else {
			return true;
		};

		match FileExt::try_lock_exclusive(file) {
			Ok(()) => {
				if let Err(e) = FileExt::unlock(file) {
					warn!(path = %self.path.display(), error = %e, "failed to release lock probe");
				}
				false
			}
			Err(_) => true,
		}
	}

	/// Try to take the lock without blocking.
	pub fn lock(&mut self) -> bool {
		if self.held {
			return true;
		}
		let Some(file) = &self.file else {
			return false;
		};

		match FileExt::try_lock_exclusive(file) {
			Ok(()) => {
				self.held = true;
				debug!(path = %self.path.display(), "process lock acquired");
				true
			}
			Err(_) => false,
		}
	}

	pub fn unlock(&mut self) -> bool {
		if !self.held {
			return false;
		}
		let Some(file) = &self.file else {
			return false;
		};

		match FileExt::unlock(file) {
			Ok(()) => {
				self.held = false;
				debug!(path = %self.path.display(), "process lock released");
				true
			}
			Err(e) => {
				warn!(path = %self.path.display(), error = %e, "failed to release process lock");
				false
			}
		}
	}

	/// Definitions that are due at `now` and have no queue entry yet.
	#[instrument(skip(self, tz))]
	pub async fn check(&self, now: DateTime<Utc>, tz: &Tz) -> Result<Vec<CronDefinition>> {
		let candidates = self.store.list_unqueued_definitions().await?;
		Ok(candidates
			.into_iter()
			.filter(|definition| definition.is_due(now, tz))
			.collect())
	}
}

impl Drop for ProcessLock {
	fn drop(&mut self) {
		self.unlock();
	}
}

impl std::fmt::Debug for ProcessLock {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ProcessLock")
			.field("path", &self.path)
			.field("usable", &self.file.is_some())
			.field("held", &self.held)
			.finish()
	}
}
