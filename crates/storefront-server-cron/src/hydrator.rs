// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Copies a flat record onto a [`JobState`].
//!
//! The record is the serialized queue entry read model. Keys without a
//! mapping are ignored so the store can grow columns without breaking jobs.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{JobError, Result};
use crate::job::JobState;

type Setter = fn(&mut JobState, &Value) -> std::result::Result<(), String>;

static FIELD_SETTERS: &[(&str, Setter)] = &[
	("id", |s, v| {
		s.queue_id = decode(v)?;
		Ok(())
	}),
	("cron_id", |s, v| {
		s.cron_id = decode(v)?;
		Ok(())
	}),
	("job_type", |s, v| {
		s.job_type = decode(v)?;
		Ok(())
	}),
	("name", |s, v| {
		s.name = decode(v)?;
		Ok(())
	}),
	("foreign_key_id", |s, v| {
		s.foreign_key_id = decode(v)?;
		Ok(())
	}),
	("foreign_key", |s, v| {
		s.foreign_key = decode(v)?;
		Ok(())
	}),
	("table_name", |s, v| {
		s.table_name = decode(v)?;
		Ok(())
	}),
	("task_limit", |s, v| {
		s.limit = decode(v)?;
		Ok(())
	}),
	("tasks_executed", |s, v| {
		s.executed = decode(v)?;
		Ok(())
	}),
	("last_processed_id", |s, v| {
		s.last_processed_id = decode(v)?;
		Ok(())
	}),
	("is_running", |s, v| {
		s.running = decode_flag(v)?;
		Ok(())
	}),
	("finished", |s, v| {
		s.finished = decode_flag(v)?;
		Ok(())
	}),
	("start_time", |s, v| {
		s.start_time = decode(v)?;
		Ok(())
	}),
	("start_date", |s, v| {
		s.start_date = decode(v)?;
		Ok(())
	}),
	("last_start", |s, v| {
		s.last_start = decode(v)?;
		Ok(())
	}),
	("last_finish", |s, v| {
		s.last_finish = decode(v)?;
		Ok(())
	}),
	("next_start", |s, v| {
		s.next_start = decode(v)?;
		Ok(())
	}),
	("frequency_hours", |s, v| {
		s.frequency_hours = decode(v)?;
		Ok(())
	}),
	("anchor_time", |s, v| {
		s.anchor_time = decode(v)?;
		Ok(())
	}),
];

fn decode<T: DeserializeOwned>(value: &Value) -> std::result::Result<T, String> {
	T::deserialize(value).map_err(|e| e.to_string())
}

/// Flags arrive either as booleans or as 0/1 integers.
fn decode_flag(value: &Value) -> std::result::Result<bool, String> {
	match value {
		Value::Bool(flag) => Ok(*flag),
		Value::Number(n) => Ok(n.as_i64().map_or(false, |n| n != 0)),
		Value::Null => Ok(false),
		other => Err(format!("expected a flag, got {other}")),
	}
}

pub struct ProgressHydrator;

impl ProgressHydrator {
	/// Apply every mapped key of `record` to `state`.
	pub fn hydrate(state: &mut JobState, record: &Value) -> Result<()> {
		let Value::Object(fields) = record else {
			return Err(JobError::Hydration {
				field: String::new(),
				message: "record is not an object".to_string(),
			});
		};

		for (key, value) in fields {
			if let Some(setter) = Self::setter(key) {
				setter(state, value).map_err(|message| JobError::Hydration {
					field: key.clone(),
					message,
				})?;
			}
		}

		Ok(())
	}

	pub fn maps(field: &str) -> bool {
		Self::setter(field).is_some()
	}

	pub fn fields() -> impl Iterator<Item = &'static str> {
		FIELD_SETTERS.iter().map(|(field, _)| *field)
	}

	fn setter(field: &str) -> Option<Setter> {
		FIELD_SETTERS
			.iter()
			.find(|(name, _)| *name == field)
			.map(|(_, setter)| *setter)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
	use proptest::prelude::*;
	use serde_json::json;
	use storefront_cron_core::{CronId, QueueId};

	fn record() -> Value {
		json!({
			"id": 7,
			"cron_id": 3,
			"job_type": "search_index",
			"name": null,
			"foreign_key_id": 4711,
			"foreign_key": "product_id",
			"table_name": "products",
			"task_limit": 50,
			"tasks_executed": 120,
			"last_processed_id": 4711,
			"is_running": 1,
			"start_time": "2024-01-01T02:00:00Z",
			"last_start": null,
			"last_finish": "2024-01-01T02:10:00.250Z",
			"start_date": "2024-01-01",
			"next_start": null,
			"frequency_hours": 6,
			"anchor_time": "02:00:00"
		})
	}

	#[test]
	fn test_hydrate_maps_record_fields() {
		let mut state = JobState::default();
		ProgressHydrator::hydrate(&mut state, &record()).unwrap();

		assert_eq!(state.queue_id, Some(QueueId(7)));
		assert_eq!(state.cron_id, Some(CronId(3)));
		assert_eq!(state.job_type, "search_index");
		assert_eq!(state.limit, 50);
		assert_eq!(state.executed, 120);
		assert_eq!(state.last_processed_id, Some(4711));
		assert!(state.running);
		assert_eq!(
			state.start_time,
			Some(Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap())
		);
		assert_eq!(state.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
		assert_eq!(state.anchor_time, NaiveTime::from_hms_opt(2, 0, 0));
		assert_eq!(state.frequency_hours, 6);
		assert!(state.last_finish.is_some());
		assert!(!state.finished);
	}

	#[test]
	fn test_partial_record_leaves_other_fields() {
		let mut state = JobState {
			executed: 9,
			..JobState::default()
		};
		ProgressHydrator::hydrate(&mut state, &json!({ "task_limit": 5 })).unwrap();
		assert_eq!(state.limit, 5);
		assert_eq!(state.executed, 9);
	}

	#[test]
	fn test_bad_value_names_field() {
		let mut state = JobState::default();
		let err = ProgressHydrator::hydrate(&mut state, &json!({ "task_limit": "many" })).unwrap_err();
		match err {
			JobError::Hydration { field, .. } => assert_eq!(field, "task_limit"),
			other => panic!("unexpected error: {other}"),
		}
	}

	#[test]
	fn test_non_object_record_rejected() {
		let mut state = JobState::default();
		assert!(ProgressHydrator::hydrate(&mut state, &json!([1, 2])).is_err());
	}

	#[test]
	fn test_field_table_has_no_duplicates() {
		let mut fields: Vec<_> = ProgressHydrator::fields().collect();
		let total = fields.len();
		fields.sort_unstable();
		fields.dedup();
		assert_eq!(fields.len(), total);
		assert!(ProgressHydrator::maps("tasks_executed"));
		assert!(!ProgressHydrator::maps("nLimitN"));
	}

	proptest! {
		#[test]
		fn unmapped_keys_are_ignored(
			extra in proptest::collection::hash_map("[a-zA-Z]{1,12}", any::<i64>(), 0..8)
		) {
			let mut with_extra = record();
			if let Value::Object(fields) = &mut with_extra {
				for (key, value) in extra {
					if !ProgressHydrator::maps(&key) {
						fields.insert(key, json!(value));
					}
				}
			}

			let mut plain = JobState::default();
			ProgressHydrator::hydrate(&mut plain, &record()).unwrap();
			let mut extended = JobState::default();
			ProgressHydrator::hydrate(&mut extended, &with_extra).unwrap();

			prop_assert_eq!(plain, extended);
		}
	}
}
