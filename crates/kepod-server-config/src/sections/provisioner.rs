// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning reconciler configuration.

use std::time::Duration;

use serde::Deserialize;

/// Settings for materializing environments on the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionerConfig {
	/// Delay between load-balancer status reads.
	pub endpoint_poll_interval_secs: u64,
	/// Number of status reads before settling on the pending sentinel.
	pub endpoint_max_attempts: u32,
	/// Port the service listens on; traffic is forwarded to the job's target port.
	pub service_port: u16,
	pub cpu_request: String,
	pub memory_request: String,
}

impl ProvisionerConfig {
	pub fn endpoint_poll_interval(&self) -> Duration {
		Duration::from_secs(self.endpoint_poll_interval_secs)
	}
}

impl Default for ProvisionerConfig {
	fn default() -> Self {
		ProvisionerConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProvisionerConfigLayer {
	pub endpoint_poll_interval_secs: Option<u64>,
	pub endpoint_max_attempts: Option<u32>,
	pub service_port: Option<u16>,
	pub cpu_request: Option<String>,
	pub memory_request: Option<String>,
}

impl ProvisionerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.endpoint_poll_interval_secs.is_some() {
			self.endpoint_poll_interval_secs = other.endpoint_poll_interval_secs;
		}
		if other.endpoint_max_attempts.is_some() {
			self.endpoint_max_attempts = other.endpoint_max_attempts;
		}
		if other.service_port.is_some() {
			self.service_port = other.service_port;
		}
		if other.cpu_request.is_some() {
			self.cpu_request = other.cpu_request;
		}
		if other.memory_request.is_some() {
			self.memory_request = other.memory_request;
		}
	}

	pub fn finalize(self) -> ProvisionerConfig {
		ProvisionerConfig {
			endpoint_poll_interval_secs: self.endpoint_poll_interval_secs.unwrap_or(10),
			endpoint_max_attempts: self.endpoint_max_attempts.unwrap_or(12),
			service_port: self.service_port.unwrap_or(80),
			cpu_request: self.cpu_request.unwrap_or_else(|| "100m".to_string()),
			memory_request: self.memory_request.unwrap_or_else(|| "128Mi".to_string()),
		}
	}
}
