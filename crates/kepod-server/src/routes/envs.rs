// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Environment creation and lookup.
//!
//! - POST /api/create-env - validate, record as `QUEUED`, enqueue provisioning
//! - GET /api/envs/{env_id} - one environment record
//! - GET /api/envs - all records, optionally filtered by `?status=`

use axum::{
	extract::{rejection::JsonRejection, Path, Query, State},
	http::StatusCode,
	Json,
};
use kepod_server_env::{submit, EnvStatus, Environment};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::ServerError;
use crate::validation::{validate_create, CreateEnvRequest};

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEnvResponse {
	pub env_id: String,
	pub status: EnvStatus,
}

/// POST /api/create-env
pub async fn create_env(
	State(state): State<AppState>,
	payload: Result<Json<CreateEnvRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateEnvResponse>), ServerError> {
	let Json(req) = payload.map_err(|e| ServerError::BadRequest(e.body_text()))?;
	let create = validate_create(req)?;

	let env = submit(state.store.as_ref(), state.queue.as_ref(), create).await?;

	Ok((
		StatusCode::CREATED,
		Json(CreateEnvResponse {
			env_id: env.env_id,
			status: env.status,
		}),
	))
}

/// GET /api/envs/{env_id}
#[tracing::instrument(skip(state))]
pub async fn get_env(
	State(state): State<AppState>,
	Path(env_id): Path<String>,
) -> Result<Json<Environment>, ServerError> {
	state
		.store
		.get(&env_id)
		.await?
		.map(Json)
		.ok_or_else(|| ServerError::NotFound(format!("Environment not found: {env_id}")))
}

#[derive(Debug, Deserialize)]
pub struct ListEnvsParams {
	pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEnvsResponse {
	pub environments: Vec<Environment>,
}

/// GET /api/envs
pub async fn list_envs(
	State(state): State<AppState>,
	Query(params): Query<ListEnvsParams>,
) -> Result<Json<ListEnvsResponse>, ServerError> {
	let status = params
		.status
		.as_deref()
		.map(str::parse::<EnvStatus>)
		.transpose()
		.map_err(ServerError::BadRequest)?;

	let environments = state.store.list(status).await?;
	Ok(Json(ListEnvsResponse { environments }))
}
