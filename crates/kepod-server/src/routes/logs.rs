// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server log endpoints.
//!
//! - GET /api/logs - recent entries from the in-memory buffer
//! - GET /api/logs/stream - SSE stream of new entries
//!
//! Both accept `namespace` to narrow output to one environment's events.

use std::convert::Infallible;

use axum::{
	extract::{Query, State},
	response::sse::{Event, KeepAlive, Sse},
	Json,
};
use futures::stream::Stream;
use kepod_server_logs::{LogEntry, LogLevel, LogQuery};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::api::AppState;
use crate::error::ServerError;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct ListLogsParams {
	/// Maximum entries returned (default 100, max 1000).
	pub limit: Option<usize>,
	/// Minimum level: trace, debug, info, warn, error.
	pub level: Option<String>,
	/// Target prefix, e.g. `kepod_server_env`.
	pub target: Option<String>,
	pub namespace: Option<String>,
	/// Only entries with an id greater than this, for polling.
	pub after_id: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListLogsResponse {
	/// Oldest first.
	pub entries: Vec<LogEntry>,
	pub buffer_size: usize,
	pub buffer_capacity: usize,
}

fn parse_level(level: Option<&str>) -> Result<Option<LogLevel>, ServerError> {
	level
		.map(str::parse::<LogLevel>)
		.transpose()
		.map_err(ServerError::BadRequest)
}

/// GET /api/logs
#[tracing::instrument(skip(state), fields(limit = ?params.limit, level = ?params.level))]
pub async fn list_logs(
	State(state): State<AppState>,
	Query(params): Query<ListLogsParams>,
) -> Result<Json<ListLogsResponse>, ServerError> {
	let query = LogQuery {
		limit: Some(params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)),
		min_level: parse_level(params.level.as_deref())?,
		target_prefix: params.target,
		namespace: params.namespace,
		after_id: params.after_id,
	};

	Ok(Json(ListLogsResponse {
		entries: state.log_buffer.query(&query),
		buffer_size: state.log_buffer.len(),
		buffer_capacity: state.log_buffer.capacity(),
	}))
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamLogsParams {
	pub level: Option<String>,
	pub target: Option<String>,
	pub namespace: Option<String>,
}

/// GET /api/logs/stream
pub async fn stream_logs(
	State(state): State<AppState>,
	Query(params): Query<StreamLogsParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ServerError> {
	let filter = LogQuery {
		min_level: parse_level(params.level.as_deref())?,
		target_prefix: params.target,
		namespace: params.namespace,
		..LogQuery::default()
	};

	let stream = BroadcastStream::new(state.log_buffer.subscribe()).filter_map(move |result| {
		// Lagged receivers skip ahead.
		let entry = result.ok()?;
		if !filter.matches(&entry) {
			return None;
		}
		serde_json::to_string(&entry)
			.ok()
			.map(|json| Ok::<_, Infallible>(Event::default().data(json)))
	});

	Ok(Sse::new(stream).keep_alive(
		KeepAlive::new()
			.interval(std::time::Duration::from_secs(15))
			.text("keep-alive"),
	))
}
