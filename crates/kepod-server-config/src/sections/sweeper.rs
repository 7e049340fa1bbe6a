// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use serde::Deserialize;

/// Expiry sweeper configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweeperConfig {
	/// When set, `serve` runs a sweep pass on this interval. When unset the
	/// sweep only runs on an external trigger.
	pub interval_secs: Option<u64>,
	/// Base URL of the server that receives archival signals. When unset,
	/// `serve` archives in-process and the one-shot `sweep` command signals
	/// `http.public_url`.
	pub archive_url: Option<String>,
}

impl SweeperConfig {
	pub fn interval(&self) -> Option<Duration> {
		self.interval_secs.map(Duration::from_secs)
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SweeperConfigLayer {
	pub interval_secs: Option<u64>,
	pub archive_url: Option<String>,
}

impl SweeperConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.interval_secs.is_some() {
			self.interval_secs = other.interval_secs;
		}
		if other.archive_url.is_some() {
			self.archive_url = other.archive_url;
		}
	}

	pub fn finalize(self) -> SweeperConfig {
		SweeperConfig {
			interval_secs: self.interval_secs.filter(|s| *s > 0),
			archive_url: self
				.archive_url
				.map(|u| u.trim_end_matches('/').to_string()),
		}
	}
}
