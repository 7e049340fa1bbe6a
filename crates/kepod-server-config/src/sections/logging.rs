// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server logging configuration.

use std::path::PathBuf;

use serde::Deserialize;

/// Console output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
}

impl LogFormat {
	pub fn parse(value: &str) -> Option<Self> {
		match value.to_ascii_lowercase().as_str() {
			"pretty" | "text" => Some(LogFormat::Pretty),
			"json" => Some(LogFormat::Json),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
	/// Filter directive used when `RUST_LOG` is unset.
	pub level: String,
	pub format: LogFormat,
	/// When set, events carrying a `namespace` field are also appended to
	/// `{namespace_dir}/{namespace}.log`.
	pub namespace_dir: Option<PathBuf>,
	/// Entries retained by the in-memory broadcast buffer.
	pub broadcast_capacity: usize,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		LoggingConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoggingConfigLayer {
	pub level: Option<String>,
	pub format: Option<LogFormat>,
	pub namespace_dir: Option<String>,
	pub broadcast_capacity: Option<usize>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.format.is_some() {
			self.format = other.format;
		}
		if other.namespace_dir.is_some() {
			self.namespace_dir = other.namespace_dir;
		}
		if other.broadcast_capacity.is_some() {
			self.broadcast_capacity = other.broadcast_capacity;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_else(|| "info".to_string()),
			format: self.format.unwrap_or_default(),
			namespace_dir: self.namespace_dir.map(PathBuf::from),
			broadcast_capacity: self.broadcast_capacity.unwrap_or(10_000),
		}
	}
}
