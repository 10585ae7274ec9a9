// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::job::{Job, PlaceholderJob};

pub type JobConstructor = Arc<dyn Fn() -> Box<dyn Job> + Send + Sync>;

/// Maps job-type tags to constructors.
#[derive(Clone, Default)]
pub struct JobTypeRegistry {
	constructors: HashMap<String, JobConstructor>,
}

impl JobTypeRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register `constructor` under `job_type`, replacing any earlier one.
	pub fn register<F>(mut self, job_type: impl Into<String>, constructor: F) -> Self
	where
		F: Fn() -> Box<dyn Job> + Send + Sync + 'static,
	{
		self.insert(job_type, constructor);
		self
	}

	pub fn insert<F>(&mut self, job_type: impl Into<String>, constructor: F)
	where
		F: Fn() -> Box<dyn Job> + Send + Sync + 'static,
	{
		self
			.constructors
			.insert(job_type.into(), Arc::new(constructor));
	}

	pub fn tags(&self) -> Vec<&str> {
		let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
		tags.sort_unstable();
		tags
	}

	/// Construct a job for `job_type`. Unknown tags get a [`PlaceholderJob`].
	pub fn resolve(&self, job_type: &str) -> Box<dyn Job> {
		match self.constructors.get(job_type) {
			Some(constructor) => constructor(),
			None => {
				warn!(job_type, "unknown job type, using placeholder");
				Box::new(PlaceholderJob::new())
			}
		}
	}
}

impl std::fmt::Debug for JobTypeRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("JobTypeRegistry")
			.field("tags", &self.tags())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_resolve_registered_and_unknown() {
		let registry = JobTypeRegistry::new().register("noop", || Box::new(PlaceholderJob::new()));

		assert!(!registry.resolve("missing").is_finished());
		assert!(!registry.resolve("noop").is_finished());
		assert_eq!(registry.tags(), vec!["noop"]);
	}

	#[test]
	fn test_register_replaces() {
		let mut registry = JobTypeRegistry::new()
			.register("b", || Box::new(PlaceholderJob::new()))
			.register("a", || Box::new(PlaceholderJob::new()));
		registry.insert("a", || Box::new(PlaceholderJob::new()));
		assert_eq!(registry.tags(), vec!["a", "b"]);
	}
}
