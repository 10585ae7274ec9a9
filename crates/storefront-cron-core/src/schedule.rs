// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Next run calculation for cron definitions.
//!
//! A definition is scheduled by two values only: a frequency in whole hours
//! and a fixed time-of-day anchor. Recurring definitions stay phase-locked to
//! the anchor instead of drifting from the moment a run happened to finish.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::{CronError, Result};

const SECONDS_PER_HOUR: i64 = 3600;

/// Resolve the anchor time on `date` in `tz` to a UTC instant.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant.
/// Local times that fall into a DST gap move forward to the first wall-clock
/// time that exists.
pub fn anchor_occurrence(date: NaiveDate, anchor: NaiveTime, tz: &Tz) -> DateTime<Utc> {
	let local = date.and_time(anchor);
	if let Some(dt) = tz.from_local_datetime(&local).earliest() {
		return dt.with_timezone(&Utc);
	}

	let mut probe = local;
	for _ in 0..(24 * 4) {
		probe += Duration::minutes(15);
		if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
			return dt.with_timezone(&Utc);
		}
	}

	Utc.from_utc_datetime(&local)
}

/// Calculate the next eligible start for a definition that finished at `now`.
///
/// For `frequency_hours == 0` (run-once definitions) the result is the anchor
/// occurrence on `now`'s calendar day, clamped to `now` so the definition does
/// not re-arm itself.
///
/// Otherwise the result is the smallest `anchor + k * frequency` strictly after
/// `now`, for any integer `k`. Fails when that instant is not representable.
pub fn next_start(
	anchor: NaiveTime,
	frequency_hours: u32,
	now: DateTime<Utc>,
	tz: &Tz,
) -> Result<DateTime<Utc>> {
	let today = now.with_timezone(tz).date_naive();
	let anchor_at = anchor_occurrence(today, anchor, tz);

	if frequency_hours == 0 {
		return Ok(anchor_at.min(now));
	}

	let period = i64::from(frequency_hours) * SECONDS_PER_HOUR;
	let periods = floor_seconds(now - anchor_at).div_euclid(period) + 1;
	periods
		.checked_mul(period)
		.and_then(Duration::try_seconds)
		.and_then(|offset| anchor_at.checked_add_signed(offset))
		.ok_or(CronError::ScheduleOverflow(frequency_hours))
}

/// Whole seconds of `delta`, rounded towards negative infinity.
fn floor_seconds(delta: Duration) -> i64 {
	let secs = delta.num_seconds();
	if delta < Duration::seconds(secs) {
		secs - 1
	} else {
		secs
	}
}

/// Parse an anchor time in `HH:MM` or `HH:MM:SS` form.
pub fn parse_anchor(value: &str) -> Result<NaiveTime> {
	NaiveTime::parse_from_str(value, "%H:%M:%S")
		.or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
		.map_err(|_| CronError::InvalidAnchor(value.to_string()))
}

/// Parse an IANA timezone name.
pub fn parse_timezone(value: &str) -> Result<Tz> {
	value
		.parse()
		.map_err(|_| CronError::InvalidTimezone(value.to_string()))
}
