// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use axum::{extract::State, Json};
use kepod_server_env::SweepReport;

use crate::api::AppState;
use crate::error::ServerError;

/// POST /api/sweep - run one sweep pass now.
pub async fn run_sweep(State(state): State<AppState>) -> Result<Json<SweepReport>, ServerError> {
	let report = state.sweeper.sweep().await?;
	Ok(Json(report))
}
