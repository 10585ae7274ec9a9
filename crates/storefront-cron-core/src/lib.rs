// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the storefront cron scheduler.
//!
//! This crate holds the data model shared by the scheduler and its callers:
//! cron definitions, queue entries, the permanent job-type policy, the
//! next-start calculation, and the legacy combined-row adapter. It performs
//! no I/O.

pub mod definition;
pub mod entry;
pub mod error;
pub mod job_type;
pub mod legacy;
pub mod schedule;

pub use definition::{CronDefinition, CronId, NewCronDefinition, MAX_FREQUENCY_HOURS};
pub use entry::{Progress, QueueEntry, QueueId};
pub use error::{CronError, Result};
pub use legacy::LegacyCronRow;
pub use schedule::{anchor_occurrence, next_start, parse_anchor, parse_timezone};
