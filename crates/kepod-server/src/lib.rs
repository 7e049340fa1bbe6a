// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! HTTP surface for kepod.
//!
//! Serves environment creation and lookup, the archival signal receiver, an
//! on-demand sweep trigger, server logs, and WebSocket streaming of
//! environment container logs. The binary also runs the provisioning queue
//! worker and, optionally, a periodic sweep.

pub mod api;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod routes;
pub mod validation;
pub mod version;
pub mod websocket;

pub use api::{
	create_app_state, create_router, create_standalone_sweeper, create_worker, AppState,
};
pub use error::ServerError;
pub use kepod_server_config::ServerConfig;
