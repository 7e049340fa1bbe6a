// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Datelike, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an environment.
///
/// Status only ever moves forward: `QUEUED → PENDING → READY → DELETED`.
/// `PENDING` may be skipped when a job is reconciled before the dequeue is
/// recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvStatus {
	Queued,
	Pending,
	Ready,
	Deleted,
}

impl EnvStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			EnvStatus::Queued => "QUEUED",
			EnvStatus::Pending => "PENDING",
			EnvStatus::Ready => "READY",
			EnvStatus::Deleted => "DELETED",
		}
	}

	/// Whether moving from `self` to `next` goes forward.
	pub fn can_advance_to(&self, next: EnvStatus) -> bool {
		next > *self
	}
}

impl std::fmt::Display for EnvStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for EnvStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"QUEUED" => Ok(EnvStatus::Queued),
			"PENDING" => Ok(EnvStatus::Pending),
			"READY" => Ok(EnvStatus::Ready),
			"DELETED" => Ok(EnvStatus::Deleted),
			_ => Err(format!("unknown environment status: {s}")),
		}
	}
}

/// Durable state record for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
	pub env_id: String,
	#[serde(rename = "env_name")]
	pub name: String,
	pub image: String,
	/// Time-to-live in seconds, counted from `created_at`.
	pub ttl: i64,
	pub namespace: String,
	pub target_port: u16,
	pub status: EnvStatus,
	pub created_at: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub app_url: Option<String>,
}

impl Environment {
	/// Instant after which the environment may be torn down.
	///
	/// Saturates at `DateTime::<Utc>::MAX_UTC` when `ttl` is out of range.
	pub fn expires_at(&self) -> DateTime<Utc> {
		Duration::try_seconds(self.ttl)
			.and_then(|ttl| self.created_at.checked_add_signed(ttl))
			.unwrap_or(DateTime::<Utc>::MAX_UTC)
	}

	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		now >= self.expires_at()
	}
}

/// Result of a conditional status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
	/// The record matched the expected prior state and was updated.
	Applied,
	/// The record was already at or past the target state, or the write's
	/// precondition did not hold; nothing changed.
	Unchanged,
}

impl UpdateOutcome {
	pub fn applied(&self) -> bool {
		matches!(self, UpdateOutcome::Applied)
	}
}

/// A message received from the provisioning queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
	pub id: String,
	/// Handle for acknowledging this delivery. Changes on every redelivery.
	pub receipt: String,
	pub body: String,
	/// Number of times the message has been delivered, including this one.
	pub receive_count: u32,
}

/// Timestamp text format stored in the database. Fixed width with a `Z`
/// suffix so stored values order lexicographically. Instants past year 9999
/// are clamped to the last representable value.
pub(crate) fn to_db_timestamp(ts: DateTime<Utc>) -> String {
	if ts.year() > 9999 {
		return MAX_DB_TIMESTAMP.to_string();
	}
	ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

const MAX_DB_TIMESTAMP: &str = "9999-12-31T23:59:59.999Z";

pub(crate) fn from_db_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
	DateTime::parse_from_rfc3339(s)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| format!("invalid timestamp '{s}': {e}"))
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn env(ttl: i64) -> Environment {
		Environment {
			env_id: "a1".into(),
			name: "demo".into(),
			image: "nginx:latest".into(),
			ttl,
			namespace: "demo-a1".into(),
			target_port: 80,
			status: EnvStatus::Ready,
			created_at: DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
				.unwrap()
				.with_timezone(&Utc),
			app_url: None,
		}
	}

	#[test]
	fn status_only_advances() {
		assert!(EnvStatus::Queued.can_advance_to(EnvStatus::Ready));
		assert!(!EnvStatus::Ready.can_advance_to(EnvStatus::Pending));
		assert!(!EnvStatus::Deleted.can_advance_to(EnvStatus::Deleted));
	}

	#[test]
	fn status_serializes_uppercase() {
		assert_eq!(
			serde_json::to_string(&EnvStatus::Pending).unwrap(),
			"\"PENDING\""
		);
		assert_eq!("ready".parse::<EnvStatus>().unwrap(), EnvStatus::Ready);
	}

	#[test]
	fn expiry_boundary_is_inclusive() {
		let e = env(60);
		assert!(!e.is_expired(e.created_at + Duration::seconds(59)));
		assert!(e.is_expired(e.created_at + Duration::seconds(60)));
	}

	#[test]
	fn record_uses_env_name_on_the_wire() {
		let value = serde_json::to_value(env(5)).unwrap();
		assert_eq!(value["env_name"], "demo");
		assert!(value.get("app_url").is_none());
	}

	#[test]
	fn out_of_range_ttl_saturates_instead_of_overflowing() {
		let huge = env(10_000_000_000_000);
		assert_eq!(huge.expires_at(), DateTime::<Utc>::MAX_UTC);
		assert!(!huge.is_expired(huge.created_at + Duration::days(365 * 100)));

		let max = env(i64::MAX);
		assert_eq!(max.expires_at(), DateTime::<Utc>::MAX_UTC);
		assert!(!max.is_expired(Utc::now()));
	}

	#[test]
	fn far_future_timestamps_stay_sortable() {
		let stored = to_db_timestamp(DateTime::<Utc>::MAX_UTC);
		assert_eq!(stored, MAX_DB_TIMESTAMP);
		assert!(stored > to_db_timestamp(Utc::now()));
	}

	proptest! {
		#[test]
		fn db_timestamps_sort_like_instants(a in 0i64..4_000_000_000_000, b in 0i64..4_000_000_000_000) {
			let ta = DateTime::<Utc>::from_timestamp_millis(a).unwrap();
			let tb = DateTime::<Utc>::from_timestamp_millis(b).unwrap();
			prop_assert_eq!(ta.cmp(&tb), to_db_timestamp(ta).cmp(&to_db_timestamp(tb)));
		}
	}
}
