// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Container log file locations.

use std::path::PathBuf;

use serde::Deserialize;

/// Where streamed container logs are written and archived.
#[derive(Debug, Clone, PartialEq)]
pub struct LogsConfig {
	/// Scratch directory holding one `{namespace}.log` per environment.
	pub dir: PathBuf,
	/// Root of the filesystem object store used for archives.
	pub archive_dir: PathBuf,
}

impl Default for LogsConfig {
	fn default() -> Self {
		LogsConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LogsConfigLayer {
	pub dir: Option<String>,
	pub archive_dir: Option<String>,
}

impl LogsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.dir.is_some() {
			self.dir = other.dir;
		}
		if other.archive_dir.is_some() {
			self.archive_dir = other.archive_dir;
		}
	}

	pub fn finalize(self) -> LogsConfig {
		LogsConfig {
			dir: PathBuf::from(self.dir.unwrap_or_else(|| "/tmp/kepod-logs".to_string())),
			archive_dir: PathBuf::from(
				self
					.archive_dir
					.unwrap_or_else(|| "./kepod-archive".to_string()),
			),
		}
	}
}
