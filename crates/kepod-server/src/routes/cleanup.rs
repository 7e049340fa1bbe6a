// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! POST /api/cleanup/{env_id} - archival signal receiver.
//!
//! Uploads the namespace's log file to the object store and removes it
//! locally, or defers that while a live subscription is still writing it.

use axum::{
	extract::{rejection::JsonRejection, Path, State},
	Json,
};
use kepod_server_env::ArchiveOutcome;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::ServerError;

#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
	/// Defaults to the namespace recorded for the environment.
	pub namespace: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
	pub env_id: String,
	pub namespace: String,
	#[serde(flatten)]
	pub outcome: ArchiveOutcome,
}

#[tracing::instrument(skip(state, payload))]
pub async fn cleanup_env(
	State(state): State<AppState>,
	Path(env_id): Path<String>,
	payload: Result<Json<CleanupRequest>, JsonRejection>,
) -> Result<Json<CleanupResponse>, ServerError> {
	let req = match payload {
		Ok(Json(req)) => req,
		Err(JsonRejection::MissingJsonContentType(_)) => CleanupRequest::default(),
		Err(e) => return Err(ServerError::BadRequest(e.body_text())),
	};

	let namespace = match req.namespace {
		Some(namespace) => namespace,
		None => state
			.store
			.get(&env_id)
			.await?
			.map(|env| env.namespace)
			.ok_or_else(|| ServerError::NotFound(format!("Environment not found: {env_id}")))?,
	};

	let outcome = state.archiver.archive(&env_id, &namespace).await?;
	Ok(Json(CleanupResponse {
		env_id,
		namespace,
		outcome,
	}))
}
