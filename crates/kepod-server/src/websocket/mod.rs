// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! WebSocket log streaming.
//!
//! A client connects to `/ws/logs` and sends one text message,
//! `{"env_id": "..."}`. The server answers with the environment's container
//! log lines, one text frame per line, until either side closes. Failures are
//! sent as `{"error": "..."}` followed by a close frame.

mod handler;

pub use handler::ws_logs_handler;

use std::time::Duration;

/// Outbound frames buffered per connection.
pub const MAX_QUEUE_SIZE: usize = 256;

/// How long a new connection may wait before sending its subscribe request.
pub const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long teardown waits for the subscription task to release its stream.
pub const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);
