// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use storefront_server_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
///
/// Output goes to stderr so command output on stdout stays machine-readable.
pub fn init(config: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

	let (json, pretty) = match config.format {
		LogFormat::Json => (Some(fmt::layer().json().with_writer(std::io::stderr)), None),
		LogFormat::Pretty => (
			None,
			Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
		),
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(json)
		.with(pretty)
		.init();
}
