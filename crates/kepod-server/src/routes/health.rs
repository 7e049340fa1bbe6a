// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! GET /health - store and cluster reachability.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

/// Namespace read to prove the cluster API answers. A not-found reply still
/// counts as reachable.
const PROBE_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl ComponentHealth {
	fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
		match result {
			Ok(()) => Self {
				ok: true,
				error: None,
			},
			Err(e) => Self {
				ok: false,
				error: Some(e.to_string()),
			},
		}
	}
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub timestamp: String,
	pub database: ComponentHealth,
	pub kubernetes: ComponentHealth,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub queue_depth: Option<u64>,
	pub active_subscriptions: usize,
	pub version: String,
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let (database, kubernetes, queue_depth) = tokio::join!(
		state.store.ping(),
		async {
			match state.client.get_namespace(PROBE_NAMESPACE).await {
				Err(e) if !e.is_not_found() => Err(e),
				_ => Ok(()),
			}
		},
		state.queue.depth(),
	);

	let database = ComponentHealth::from_result(database);
	let kubernetes = ComponentHealth::from_result(kubernetes);
	let status = match (database.ok, kubernetes.ok) {
		(true, true) => HealthStatus::Healthy,
		(true, false) => HealthStatus::Degraded,
		(false, _) => HealthStatus::Unhealthy,
	};

	let response = HealthResponse {
		status,
		timestamp: chrono::Utc::now().to_rfc3339(),
		database,
		kubernetes,
		queue_depth: queue_depth.ok(),
		active_subscriptions: state.multiplexer.table().len(),
		version: crate::version::VERSION.to_string(),
	};

	let http_status = match status {
		HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
		HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
	};
	(http_status, Json(response))
}
