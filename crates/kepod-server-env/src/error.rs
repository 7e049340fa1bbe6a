// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the environment core.

use kepod_server_db::DbError;
use kepod_server_k8s::K8sError;

/// Failure creating a new environment.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
	#[error(transparent)]
	Store(#[from] DbError),

	#[error("Failed to encode provisioning job: {0}")]
	Encode(#[from] serde_json::Error),
}

/// A reconciliation failure. The job's queue message is left for redelivery
/// unless the error is terminal.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
	/// A cluster step failed with something other than "already exists".
	#[error("Failed to ensure {step}: {source}")]
	Cluster {
		step: &'static str,
		#[source]
		source: K8sError,
	},

	#[error(transparent)]
	Store(#[from] DbError),

	/// The job names an environment the state store has no record of.
	#[error("Environment not found: {env_id}")]
	UnknownEnvironment { env_id: String },

	/// Shutdown was requested while waiting on the load balancer.
	#[error("Reconciliation cancelled")]
	Cancelled,
}

impl ReconcileError {
	/// Whether retrying the same job can never succeed.
	pub fn is_terminal(&self) -> bool {
		matches!(self, ReconcileError::UnknownEnvironment { .. })
	}
}

/// A sweep that could not run at all. Per-environment failures are reported
/// in the sweep report instead.
#[derive(Debug, thiserror::Error)]
pub enum SweepError {
	#[error("State store unavailable: {0}")]
	Store(#[source] DbError),

	#[error("A sweep is already running")]
	AlreadyRunning,
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
	#[error("Invalid namespace: {0}")]
	InvalidNamespace(String),

	#[error("Invalid object key: {0}")]
	InvalidKey(String),

	#[error("Log archive I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Archive signal failed: {0}")]
	Signal(#[from] reqwest::Error),

	#[error("Archive signal rejected with HTTP {status}")]
	Rejected { status: u16 },
}

/// Reasons a log subscription could not be opened or was torn down.
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
	#[error("Invalid subscribe request: {0}")]
	InvalidRequest(String),

	#[error("Environment not found: {env_id}")]
	EnvironmentNotFound { env_id: String },

	#[error("No running pod for environment in namespace {namespace}")]
	PodNotFound { namespace: String },

	#[error("Connection already has a subscription")]
	AlreadySubscribed,

	#[error("Logs for namespace {namespace} are being archived")]
	Archiving { namespace: String },

	#[error(transparent)]
	Store(#[from] DbError),

	#[error(transparent)]
	Cluster(#[from] K8sError),

	#[error("Failed to open log file: {0}")]
	LogFile(#[from] std::io::Error),
}
