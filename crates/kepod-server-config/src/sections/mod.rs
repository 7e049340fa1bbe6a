// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections. Each section has a partial `*ConfigLayer` used for
//! merging sources and a fully resolved runtime struct.

mod database;
mod http;
mod logging;
mod logs;
mod provisioner;
mod queue;
mod sweeper;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use logs::{LogsConfig, LogsConfigLayer};
pub use provisioner::{ProvisionerConfig, ProvisionerConfigLayer};
pub use queue::{QueueConfig, QueueConfigLayer};
pub use sweeper::{SweeperConfig, SweeperConfigLayer};
