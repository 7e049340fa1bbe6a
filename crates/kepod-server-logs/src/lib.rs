// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Structured-logging sinks for kepod.
//!
//! Each sink is an independent `tracing_subscriber` layer; the server picks
//! which ones to install from its logging configuration:
//! - [`BroadcastLogLayer`] - captures events into a [`LogBuffer`] ring buffer
//!   that can be queried or followed live
//! - [`NamespaceFileLayer`] - appends every event carrying a `namespace` field
//!   to `{dir}/{namespace}.log`
//!
//! # Usage
//!
//! ```ignore
//! use kepod_server_logs::{BroadcastLogLayer, LogBuffer, NamespaceFileLayer};
//! use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
//!
//! let log_buffer = LogBuffer::new(10_000);
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(BroadcastLogLayer::new(log_buffer.clone()))
//!     .with(Some(NamespaceFileLayer::new("/tmp/kepod-logs")))
//!     .init();
//! ```

mod buffer;
mod entry;
mod layer;
mod namespace_file;
mod visitor;

pub use buffer::{LogBuffer, LogQuery, DEFAULT_CAPACITY};
pub use entry::{LogEntry, LogLevel};
pub use layer::BroadcastLogLayer;
pub use namespace_file::{is_safe_namespace, NamespaceFileLayer, MAX_NAMESPACE_LEN};
