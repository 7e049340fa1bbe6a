// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Server error types and HTTP response conversions.

use axum::{
	http::StatusCode,
	response::{IntoResponse, Response},
	Json,
};
use kepod_server_db::DbError;
use kepod_server_env::{ArchiveError, SubmitError, SweepError};
use serde::Serialize;

use crate::validation::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
	#[error("Database error: {0}")]
	Db(#[from] DbError),

	#[error("Not found: {0}")]
	NotFound(String),

	#[error("Invalid request: {0}")]
	BadRequest(String),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Service unavailable: {0}")]
	ServiceUnavailable(String),

	#[error("Internal error: {0}")]
	Internal(String),
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}

impl ServerError {
	fn parts(&self) -> (StatusCode, &'static str, String) {
		match self {
			ServerError::Db(DbError::NotFound(what)) => {
				(StatusCode::NOT_FOUND, "not_found", format!("Not found: {what}"))
			}
			ServerError::Db(DbError::Conflict(what)) => {
				(StatusCode::CONFLICT, "conflict", what.clone())
			}
			ServerError::Db(e) => {
				tracing::error!(error = %e, "database error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"database_error",
					"A database error occurred".to_string(),
				)
			}
			ServerError::NotFound(what) => (StatusCode::NOT_FOUND, "not_found", what.clone()),
			ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
			ServerError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
			ServerError::ServiceUnavailable(msg) => {
				tracing::warn!(message = %msg, "service unavailable");
				(
					StatusCode::SERVICE_UNAVAILABLE,
					"service_unavailable",
					msg.clone(),
				)
			}
			ServerError::Internal(msg) => {
				tracing::error!(message = %msg, "internal error");
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"An internal error occurred".to_string(),
				)
			}
		}
	}
}

impl IntoResponse for ServerError {
	fn into_response(self) -> Response {
		let (status, error, message) = self.parts();
		(
			status,
			Json(ErrorResponse {
				error: error.to_string(),
				message,
			}),
		)
			.into_response()
	}
}

impl From<ValidationError> for ServerError {
	fn from(err: ValidationError) -> Self {
		ServerError::BadRequest(err.to_string())
	}
}

impl From<SubmitError> for ServerError {
	fn from(err: SubmitError) -> Self {
		match err {
			SubmitError::Store(e) => ServerError::Db(e),
			SubmitError::Encode(e) => ServerError::Internal(e.to_string()),
		}
	}
}

impl From<SweepError> for ServerError {
	fn from(err: SweepError) -> Self {
		match err {
			SweepError::AlreadyRunning => ServerError::Conflict(err.to_string()),
			SweepError::Store(e) => ServerError::ServiceUnavailable(e.to_string()),
		}
	}
}

impl From<ArchiveError> for ServerError {
	fn from(err: ArchiveError) -> Self {
		match err {
			ArchiveError::InvalidNamespace(_) | ArchiveError::InvalidKey(_) => {
				ServerError::BadRequest(err.to_string())
			}
			other => ServerError::Internal(other.to_string()),
		}
	}
}
