// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommand implementations. Each writes its report to `out`.

use anyhow::{bail, Context};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use storefront_cron_core::{
	parse_anchor, parse_timezone, CronError, CronId, LegacyCronRow, NewCronDefinition,
};
use storefront_server_config::{CronConfig, StorefrontConfig};
use storefront_server_cron::{
	create_pool, ensure_schema, CronAdmin, CronStore, DeleteReport, JobBuilder, JobTypeRegistry,
	ProcessLock, RunOutcome, SqliteCronStore, WorkQueue, WorkQueueSettings,
};

use crate::args::{CreateArgs, DeleteArgs};

/// Resolved configuration plus an open store.
pub struct App {
	pub config: StorefrontConfig,
	pub settings: WorkQueueSettings,
	pub store: Arc<dyn CronStore>,
}

impl App {
	pub async fn connect(config: StorefrontConfig) -> anyhow::Result<Self> {
		let settings = settings_from_config(&config.cron)?;
		let pool = create_pool(&config.database.url)
			.await
			.with_context(|| format!("opening database {}", config.database.url))?;
		ensure_schema(&pool).await.context("creating schema")?;
		let store: Arc<dyn CronStore> = Arc::new(SqliteCronStore::new(pool));
		Ok(Self {
			config,
			settings,
			store,
		})
	}

	fn admin(&self) -> CronAdmin {
		CronAdmin::new(self.store.clone())
	}
}

pub fn settings_from_config(cron: &CronConfig) -> Result<WorkQueueSettings, CronError> {
	Ok(WorkQueueSettings {
		job_limit: cron.job_limit as usize,
		stuck_threshold: Duration::hours(i64::from(cron.stuck_threshold_hours)),
		timezone: parse_timezone(&cron.timezone)?,
		default_task_limit: cron.default_task_limit,
	})
}

/// One scheduler cycle. Prints the processed count, or -1 if another run
/// holds the lock.
pub async fn run(
	app: &App,
	registry: JobTypeRegistry,
	out: &mut impl Write,
) -> anyhow::Result<RunOutcome> {
	let queue = WorkQueue::new(
		app.store.clone(),
		JobBuilder::new(Arc::new(registry)),
		app.settings.clone(),
	);
	let mut lock = ProcessLock::new(&app.config.cron.lock_file, app.store.clone());
	let outcome = queue.run(&mut lock).await?;
	writeln!(out, "{}", outcome.code())?;
	Ok(outcome)
}

pub async fn list(app: &App, json: bool, out: &mut impl Write) -> anyhow::Result<()> {
	let definitions = app.admin().list().await?;
	if json {
		serde_json::to_writer_pretty(&mut *out, &definitions)?;
		writeln!(out)?;
		return Ok(());
	}

	writeln!(out, "{:>6}  {:<24} {:>6}  {:<8}  NEXT START", "ID", "TYPE", "EVERY", "ANCHOR")?;
	for definition in &definitions {
		writeln!(
			out,
			"{:>6}  {:<24} {:>5}h  {:<8}  {}",
			definition.id,
			definition.display_name(),
			definition.frequency_hours,
			definition.anchor().format("%H:%M:%S"),
			format_instant(definition.next_start),
		)?;
	}
	Ok(())
}

pub async fn status(
	app: &App,
	now: DateTime<Utc>,
	json: bool,
	out: &mut impl Write,
) -> anyhow::Result<()> {
	let statuses = app.admin().status(now, app.settings.stuck_threshold).await?;
	if json {
		serde_json::to_writer_pretty(&mut *out, &statuses)?;
		writeln!(out)?;
		return Ok(());
	}

	writeln!(out, "{:>6}  {:<24} {:<8}  PROGRESS", "ID", "TYPE", "STATE")?;
	for status in &statuses {
		let progress = match &status.progress {
			Some(p) => format!("{}/{} per run", p.tasks_executed, p.task_limit),
			None => "-".to_string(),
		};
		writeln!(
			out,
			"{:>6}  {:<24} {:<8}  {}",
			status.definition.id,
			status.definition.display_name(),
			status.state,
			progress,
		)?;
	}
	Ok(())
}

pub async fn create(
	app: &App,
	args: CreateArgs,
	today: NaiveDate,
	out: &mut impl Write,
) -> anyhow::Result<()> {
	let mut definition = NewCronDefinition::new(args.job_type, args.start_date.unwrap_or(today))
		.with_frequency(args.frequency);
	if let Some(name) = args.name {
		definition = definition.with_name(name);
	}
	if let Some(anchor) = args.anchor.as_deref() {
		definition = definition.with_anchor(parse_anchor(anchor)?);
	}
	if let Some(limit) = args.task_limit {
		definition = definition.with_task_limit(limit);
	}

	let id = app.admin().create(&definition).await?;
	writeln!(out, "{id}")?;
	Ok(())
}

pub async fn delete(app: &App, args: DeleteArgs, out: &mut impl Write) -> anyhow::Result<()> {
	let admin = app.admin();
	let report = match args.job_type {
		Some(job_type) => admin.delete_by_type(&job_type).await?,
		None => admin.delete_by_ids(&args.ids).await?,
	};
	write_report(&report, out)?;
	Ok(())
}

pub async fn rearm(
	app: &App,
	id: CronId,
	at: Option<DateTime<Utc>>,
	now: DateTime<Utc>,
	out: &mut impl Write,
) -> anyhow::Result<()> {
	let next = app.admin().rearm(id, at.unwrap_or(now), now).await?;
	writeln!(out, "{id} due at {}", next.to_rfc3339())?;
	Ok(())
}

pub async fn export_legacy(app: &App, out: &mut impl Write) -> anyhow::Result<()> {
	let rows = app.admin().export_legacy().await?;
	serde_json::to_writer_pretty(&mut *out, &rows)?;
	writeln!(out)?;
	Ok(())
}

pub async fn import_legacy(app: &App, file: &Path, out: &mut impl Write) -> anyhow::Result<()> {
	let contents = std::fs::read_to_string(file)
		.with_context(|| format!("reading {}", file.display()))?;
	let rows: Vec<LegacyCronRow> = serde_json::from_str(&contents)
		.with_context(|| format!("parsing {}", file.display()))?;
	if rows.is_empty() {
		bail!("{} contains no rows", file.display());
	}

	let applied = app.admin().import_legacy(&rows).await?;
	info!(applied, total = rows.len(), "legacy import finished");
	writeln!(out, "{applied} of {} rows applied", rows.len())?;
	Ok(())
}

fn write_report(report: &DeleteReport, out: &mut impl Write) -> std::io::Result<()> {
	writeln!(out, "deleted: {}", join_ids(&report.deleted))?;
	if !report.protected.is_empty() {
		writeln!(out, "protected: {}", join_ids(&report.protected))?;
	}
	if !report.missing.is_empty() {
		writeln!(out, "missing: {}", join_ids(&report.missing))?;
	}
	Ok(())
}

fn join_ids(ids: &[CronId]) -> String {
	if ids.is_empty() {
		return "none".to_string();
	}
	ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

fn format_instant(value: Option<DateTime<Utc>>) -> String {
	value.map_or_else(|| "-".to_string(), |at| at.to_rfc3339())
}
