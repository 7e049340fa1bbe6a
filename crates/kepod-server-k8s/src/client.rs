// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::error::K8sError;
use crate::types::{Deployment, LogOptions, LogStream, Namespace, Pod, Service};

/// Trait for K8s client operations.
///
/// This abstraction allows for easy mocking in tests while providing
/// a clean interface for the operations needed by the environment
/// provisioner, the expiry sweeper and the log multiplexer.
///
/// Create calls report an existing resource as [`K8sError::AlreadyExists`];
/// reads and deletes report a missing resource with the kind-specific
/// not-found variant. Callers decide which of those count as success.
#[async_trait]
pub trait K8sClient: Send + Sync {
	/// Create a namespace.
	async fn create_namespace(&self, namespace: Namespace) -> Result<Namespace, K8sError>;

	/// Get a namespace by name.
	async fn get_namespace(&self, name: &str) -> Result<Namespace, K8sError>;

	/// Delete a namespace and everything in it.
	async fn delete_namespace(&self, name: &str) -> Result<(), K8sError>;

	/// Create a deployment in the specified namespace.
	async fn create_deployment(
		&self,
		namespace: &str,
		deployment: Deployment,
	) -> Result<Deployment, K8sError>;

	/// Create a service in the specified namespace.
	async fn create_service(&self, namespace: &str, service: Service) -> Result<Service, K8sError>;

	/// Get a service by name from the specified namespace.
	async fn get_service(&self, name: &str, namespace: &str) -> Result<Service, K8sError>;

	/// List pods in a namespace. An empty selector lists every pod.
	async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>, K8sError>;

	/// Follow logs from a container in a pod.
	async fn stream_logs(
		&self,
		name: &str,
		namespace: &str,
		container: &str,
		opts: LogOptions,
	) -> Result<LogStream, K8sError>;
}
