// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning queue consumer configuration.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
	/// Maximum messages received per poll.
	pub batch_size: usize,
	/// Maximum jobs reconciled concurrently within a batch.
	pub max_parallel: usize,
	/// Seconds a received message stays invisible before redelivery.
	pub visibility_timeout_secs: u64,
	/// Sleep between polls when the queue is empty.
	pub idle_poll_ms: u64,
}

impl QueueConfig {
	pub fn visibility_timeout(&self) -> Duration {
		Duration::from_secs(self.visibility_timeout_secs)
	}

	pub fn idle_poll(&self) -> Duration {
		Duration::from_millis(self.idle_poll_ms)
	}
}

impl Default for QueueConfig {
	fn default() -> Self {
		QueueConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct QueueConfigLayer {
	pub batch_size: Option<usize>,
	pub max_parallel: Option<usize>,
	pub visibility_timeout_secs: Option<u64>,
	pub idle_poll_ms: Option<u64>,
}

impl QueueConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.batch_size.is_some() {
			self.batch_size = other.batch_size;
		}
		if other.max_parallel.is_some() {
			self.max_parallel = other.max_parallel;
		}
		if other.visibility_timeout_secs.is_some() {
			self.visibility_timeout_secs = other.visibility_timeout_secs;
		}
		if other.idle_poll_ms.is_some() {
			self.idle_poll_ms = other.idle_poll_ms;
		}
	}

	pub fn finalize(self) -> QueueConfig {
		QueueConfig {
			batch_size: self.batch_size.unwrap_or(10),
			max_parallel: self.max_parallel.unwrap_or(4),
			visibility_timeout_secs: self.visibility_timeout_secs.unwrap_or(300),
			idle_poll_ms: self.idle_poll_ms.unwrap_or(1000),
		}
	}
}
