// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job type tags and the permanent-type policy.
//!
//! Concrete jobs register under a string tag. A few tags belong to jobs the
//! storefront cannot operate without; definitions carrying those tags are
//! never removed by bulk or administrative deletion.

use crate::error::{CronError, Result};

/// Periodic license validation.
pub const LICENSE_CHECK: &str = "license_check";

/// Outgoing mail queue flushing.
pub const MAIL_QUEUE: &str = "mail_queue";

/// Tags exempt from deletion.
pub const PERMANENT: &[&str] = &[LICENSE_CHECK, MAIL_QUEUE];

const MAX_TAG_LEN: usize = 64;

/// Whether definitions with this tag are protected from deletion.
pub fn is_permanent(tag: &str) -> bool {
	PERMANENT.contains(&tag)
}

/// Split items into `(deletable, protected)` by their job type tag.
pub fn partition_permanent<T, F>(items: Vec<T>, tag_of: F) -> (Vec<T>, Vec<T>)
where
	F: Fn(&T) -> &str,
{
	items.into_iter().partition(|item| !is_permanent(tag_of(item)))
}

/// Validate a job type tag: 1-64 chars of lowercase ascii, digits, `_`, `-`, `.` or `:`.
pub fn validate_tag(tag: &str) -> Result<()> {
	let valid = !tag.is_empty()
		&& tag.len() <= MAX_TAG_LEN
		&& tag
			.chars()
			.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.' | ':'));

	if valid {
		Ok(())
	} else {
		Err(CronError::InvalidJobType(tag.to_string()))
	}
}
