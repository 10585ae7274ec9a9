// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `storefront-cron`: the external trigger for the storefront scheduler.
//!
//! A system cron or timer invokes `storefront-cron run` periodically; the
//! remaining subcommands administer the schedule.

mod args;
mod commands;
mod logging;

use chrono::Utc;
use clap::Parser;
use std::io::Write;

use storefront_server_config::{load_config, load_config_with_file};
use storefront_server_cron::JobTypeRegistry;

use crate::args::{Args, Command};
use crate::commands::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = match &args.config {
		Some(path) => load_config_with_file(path)?,
		None => load_config()?,
	};
	logging::init(&config.logging);

	let app = App::connect(config).await?;
	let stdout = std::io::stdout();
	let mut out = stdout.lock();

	match args.command {
		Command::Run => {
			commands::run(&app, JobTypeRegistry::new(), &mut out).await?;
		}
		Command::List { json } => commands::list(&app, json, &mut out).await?,
		Command::Status { json } => commands::status(&app, Utc::now(), json, &mut out).await?,
		Command::Create(create) => {
			commands::create(&app, create, Utc::now().date_naive(), &mut out).await?
		}
		Command::Delete(delete) => commands::delete(&app, delete, &mut out).await?,
		Command::Rearm { id, at } => commands::rearm(&app, id, at, Utc::now(), &mut out).await?,
		Command::Migrate => {
			tracing::info!(url = %app.config.database.url, "schema up to date");
			writeln!(out, "ok")?;
		}
		Command::ExportLegacy => commands::export_legacy(&app, &mut out).await?,
		Command::ImportLegacy { file } => commands::import_legacy(&app, &file, &mut out).await?,
	}

	out.flush()?;
	Ok(())
}
