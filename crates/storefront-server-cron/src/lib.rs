// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background cron scheduler for the storefront server.
//!
//! An external timer invokes [`WorkQueue::run`] at a short interval. Each run
//! takes the [`ProcessLock`], turns newly due cron definitions into queue
//! entries, reclaims entries left running by a crashed process, and executes a
//! bounded, shuffled batch of runnable entries through their registered
//! [`Job`] implementations.

pub mod admin;
pub mod builder;
pub mod context;
pub mod error;
pub mod health;
pub mod hydrator;
pub mod job;
pub mod lock;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod testing;

pub use admin::{CronAdmin, DeleteReport};
pub use builder::JobBuilder;
pub use context::JobContext;
pub use error::{JobError, Result};
pub use health::{DefinitionStatus, QueueState};
pub use hydrator::ProgressHydrator;
pub use job::{Job, JobState, PlaceholderJob};
pub use lock::ProcessLock;
pub use pool::create_pool;
pub use queue::{RunOutcome, WorkQueue, WorkQueueSettings, ALREADY_RUNNING};
pub use registry::{JobConstructor, JobTypeRegistry};
pub use repository::{CronStore, ProgressKey, SqliteCronStore};
pub use schema::ensure_schema;

pub use storefront_cron_core::{
	CronDefinition, CronId, NewCronDefinition, Progress, QueueEntry, QueueId,
};
