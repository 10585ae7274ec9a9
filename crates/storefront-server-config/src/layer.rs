// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{CronConfigLayer, DatabaseConfigLayer, LoggingConfigLayer};

/// One partial configuration as read from a single source.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorefrontConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub cron: Option<CronConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl StorefrontConfigLayer {
	/// Overlay `other` onto this layer; values present in `other` win.
	pub fn merge(&mut self, other: StorefrontConfigLayer) {
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.cron, other.cron, CronConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	let Some(overlay) = other else {
		return;
	};
	match base {
		Some(existing) => merge(existing, overlay),
		None => *base = Some(overlay),
	}
}
