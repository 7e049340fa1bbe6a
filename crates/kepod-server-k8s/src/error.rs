// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Result type alias for K8s operations.
pub type K8sResult<T> = Result<T, K8sError>;

/// Errors that can occur during K8s operations.
#[derive(Error, Debug)]
pub enum K8sError {
	#[error("K8s API error: {message}")]
	ApiError { message: String },

	#[error("{kind} already exists: {name}")]
	AlreadyExists { kind: &'static str, name: String },

	#[error("Pod not found: {name}")]
	PodNotFound { name: String },

	#[error("Namespace not found: {name}")]
	NamespaceNotFound { name: String },

	#[error("Service not found: {name}")]
	ServiceNotFound { name: String },

	#[error("Log stream error: {message}")]
	StreamError { message: String },
}

impl K8sError {
	/// Whether this error reports a resource that is already present.
	pub fn is_already_exists(&self) -> bool {
		matches!(self, K8sError::AlreadyExists { .. })
	}

	/// Whether this error reports a missing resource of any kind.
	pub fn is_not_found(&self) -> bool {
		matches!(
			self,
			K8sError::PodNotFound { .. }
				| K8sError::NamespaceNotFound { .. }
				| K8sError::ServiceNotFound { .. }
		)
	}
}

impl From<kube::Error> for K8sError {
	fn from(err: kube::Error) -> Self {
		K8sError::ApiError {
			message: err.to_string(),
		}
	}
}

/// Classify a `kube::Error` for a create call: HTTP 409 becomes
/// [`K8sError::AlreadyExists`].
pub(crate) fn on_create(err: kube::Error, kind: &'static str, name: &str) -> K8sError {
	match err {
		kube::Error::Api(ref resp) if resp.code == 409 => K8sError::AlreadyExists {
			kind,
			name: name.to_string(),
		},
		e => e.into(),
	}
}
