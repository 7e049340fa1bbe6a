// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a captured log event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Trace,
	Debug,
	Info,
	Warn,
	Error,
}

impl LogLevel {
	pub fn from_tracing(level: &tracing::Level) -> Self {
		match *level {
			tracing::Level::TRACE => LogLevel::Trace,
			tracing::Level::DEBUG => LogLevel::Debug,
			tracing::Level::INFO => LogLevel::Info,
			tracing::Level::WARN => LogLevel::Warn,
			tracing::Level::ERROR => LogLevel::Error,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			LogLevel::Trace => "trace",
			LogLevel::Debug => "debug",
			LogLevel::Info => "info",
			LogLevel::Warn => "warn",
			LogLevel::Error => "error",
		}
	}
}

impl std::str::FromStr for LogLevel {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"trace" => Ok(LogLevel::Trace),
			"debug" => Ok(LogLevel::Debug),
			"info" => Ok(LogLevel::Info),
			"warn" | "warning" => Ok(LogLevel::Warn),
			"error" => Ok(LogLevel::Error),
			other => Err(format!("unknown log level '{other}'")),
		}
	}
}

/// A captured log event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
	/// Monotonically increasing id, unique within one buffer.
	pub id: u64,
	pub timestamp: DateTime<Utc>,
	pub level: LogLevel,
	pub target: String,
	pub message: String,
	pub fields: Vec<(String, String)>,
}

impl LogEntry {
	pub fn new(
		id: u64,
		level: LogLevel,
		target: String,
		message: String,
		fields: Vec<(String, String)>,
	) -> Self {
		Self {
			id,
			timestamp: Utc::now(),
			level,
			target,
			message,
			fields,
		}
	}

	/// Value of a named structured field, if the event recorded one.
	pub fn field(&self, name: &str) -> Option<&str> {
		self
			.fields
			.iter()
			.find(|(k, _)| k == name)
			.map(|(_, v)| v.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn level_ordering() {
		assert!(LogLevel::Error > LogLevel::Warn);
		assert!(LogLevel::Debug < LogLevel::Info);
	}

	#[test]
	fn parse_level() {
		assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
		assert!("loud".parse::<LogLevel>().is_err());
	}

	#[test]
	fn field_lookup() {
		let entry = LogEntry::new(
			1,
			LogLevel::Info,
			"kepod".into(),
			"ready".into(),
			vec![("namespace".into(), "demo-abc".into())],
		);
		assert_eq!(entry.field("namespace"), Some("demo-abc"));
		assert_eq!(entry.field("env_id"), None);
	}
}
