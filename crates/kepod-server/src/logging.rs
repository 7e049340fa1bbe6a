// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup.

use kepod_server_config::{LogFormat, LoggingConfig};
use kepod_server_logs::{BroadcastLogLayer, LogBuffer, NamespaceFileLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber and return the buffer backing
/// `/api/logs`.
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn init_tracing(config: &LoggingConfig) -> LogBuffer {
	let log_buffer = LogBuffer::new(config.broadcast_capacity);

	let (pretty, json) = match config.format {
		LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
		LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
	};

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.level.clone().into()))
		.with(pretty)
		.with(json)
		.with(config.namespace_dir.clone().map(NamespaceFileLayer::new))
		.with(BroadcastLogLayer::new(log_buffer.clone()))
		.init();

	log_buffer
}
