// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::Deserialize;

use crate::sections::{
	DatabaseConfigLayer, HttpConfigLayer, LoggingConfigLayer, LogsConfigLayer,
	ProvisionerConfigLayer, QueueConfigLayer, SweeperConfigLayer,
};

/// Partial server configuration produced by a single source.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfigLayer {
	pub http: Option<HttpConfigLayer>,
	pub database: Option<DatabaseConfigLayer>,
	pub queue: Option<QueueConfigLayer>,
	pub provisioner: Option<ProvisionerConfigLayer>,
	pub sweeper: Option<SweeperConfigLayer>,
	pub logs: Option<LogsConfigLayer>,
	pub logging: Option<LoggingConfigLayer>,
}

fn merge_section<T: Default>(slot: &mut Option<T>, other: Option<T>, merge: impl FnOnce(&mut T, T)) {
	if let Some(other) = other {
		merge(slot.get_or_insert_with(T::default), other);
	}
}

impl ServerConfigLayer {
	/// Overlay `other` on top of `self`; fields set in `other` win.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_section(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_section(&mut self.database, other.database, DatabaseConfigLayer::merge);
		merge_section(&mut self.queue, other.queue, QueueConfigLayer::merge);
		merge_section(
			&mut self.provisioner,
			other.provisioner,
			ProvisionerConfigLayer::merge,
		);
		merge_section(&mut self.sweeper, other.sweeper, SweeperConfigLayer::merge);
		merge_section(&mut self.logs, other.logs, LogsConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}
