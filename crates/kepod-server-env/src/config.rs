// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Settings for the provisioning reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
	pub endpoint_poll_interval: Duration,
	pub endpoint_max_attempts: u32,
	pub service_port: u16,
	pub cpu_request: String,
	pub memory_request: String,
}

impl Default for ReconcilerConfig {
	fn default() -> Self {
		Self {
			endpoint_poll_interval: Duration::from_secs(10),
			endpoint_max_attempts: 12,
			service_port: 80,
			cpu_request: "100m".to_string(),
			memory_request: "128Mi".to_string(),
		}
	}
}

/// Settings for the queue consumer loop.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
	pub batch_size: usize,
	pub max_parallel: usize,
	pub visibility_timeout: Duration,
	pub idle_poll: Duration,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			batch_size: 10,
			max_parallel: 4,
			visibility_timeout: Duration::from_secs(300),
			idle_poll: Duration::from_secs(1),
		}
	}
}
