// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use storefront_cron_core::CronId;

/// Storefront cron scheduler: run trigger and schedule administration.
#[derive(Parser, Debug)]
#[command(name = "storefront-cron", version)]
pub struct Args {
	/// Config file (defaults to /etc/storefront/cron.toml)
	#[arg(long, global = true, env = "STOREFRONT_CONFIG")]
	pub config: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Run one scheduler cycle
	Run,

	/// List cron definitions
	List {
		#[arg(long)]
		json: bool,
	},

	/// Show queue state per definition
	Status {
		#[arg(long)]
		json: bool,
	},

	/// Create a cron definition
	Create(CreateArgs),

	/// Delete cron definitions; permanent job types are skipped
	Delete(DeleteArgs),

	/// Arm a definition to run again
	Rearm {
		id: CronId,

		/// When it becomes due (RFC 3339); defaults to now
		#[arg(long)]
		at: Option<DateTime<Utc>>,
	},

	/// Create the schedule tables
	Migrate,

	/// Print queue entries as legacy combined rows (JSON)
	ExportLegacy,

	/// Apply progress counters from a legacy JSON export
	ImportLegacy { file: PathBuf },
}

#[derive(ClapArgs, Debug)]
pub struct CreateArgs {
	/// Job type tag
	#[arg(long = "type")]
	pub job_type: String,

	#[arg(long)]
	pub name: Option<String>,

	/// Hours between runs; 0 runs once until re-armed
	#[arg(long, default_value_t = 24)]
	pub frequency: u32,

	/// First eligible day (YYYY-MM-DD); defaults to today
	#[arg(long)]
	pub start_date: Option<NaiveDate>,

	/// Time of day the schedule is anchored to (HH:MM or HH:MM:SS)
	#[arg(long)]
	pub anchor: Option<String>,

	/// Tasks per run
	#[arg(long)]
	pub task_limit: Option<u32>,
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
pub struct DeleteArgs {
	/// Comma-separated definition ids
	#[arg(long, value_delimiter = ',')]
	pub ids: Vec<CronId>,

	/// Delete every definition of this job type
	#[arg(long = "type")]
	pub job_type: Option<String>,
}
