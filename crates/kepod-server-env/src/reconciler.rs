// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Provisioning reconciler.
//!
//! Drives the cluster toward the desired state for one [`ProvisionJob`]:
//! namespace, deployment and load-balancer service, in that order. Every step
//! treats "already exists" as success, so a redelivered job converges on the
//! same resources instead of failing or duplicating them. Once the service
//! exists the reconciler polls for a public endpoint a bounded number of times
//! and records whatever it found, or the `pending` placeholder.

use std::sync::Arc;

use kepod_server_db::{EnvStatus, EnvironmentStore, UpdateOutcome};
use kepod_server_k8s::{ingress_hostname, K8sClient, K8sError};
use tokio_util::sync::CancellationToken;

use crate::config::ReconcilerConfig;
use crate::error::ReconcileError;
use crate::job::ProvisionJob;
use crate::manifests::{build_deployment, build_namespace, build_service};
use crate::naming::{self, EXISTING_SERVICE, PENDING_ENDPOINT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
	/// All resources exist and the record is `READY` (or already was).
	Ready {
		app_url: String,
		commit: UpdateOutcome,
	},
	/// The environment was torn down before this job ran; nothing was created.
	AlreadyDeleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceState {
	Created,
	Existing,
}

pub struct Reconciler {
	client: Arc<dyn K8sClient>,
	store: Arc<dyn EnvironmentStore>,
	config: ReconcilerConfig,
	shutdown: CancellationToken,
}

impl Reconciler {
	pub fn new(
		client: Arc<dyn K8sClient>,
		store: Arc<dyn EnvironmentStore>,
		config: ReconcilerConfig,
	) -> Self {
		Self {
			client,
			store,
			config,
			shutdown: CancellationToken::new(),
		}
	}

	/// Abort endpoint polling when `token` is cancelled.
	pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
		self.shutdown = token;
		self
	}

	#[tracing::instrument(
		skip(self, job),
		fields(env_id = %job.env_id, namespace = %job.namespace)
	)]
	pub async fn reconcile(&self, job: &ProvisionJob) -> Result<ReconcileOutcome, ReconcileError> {
		let record = self
			.store
			.get(&job.env_id)
			.await?
			.ok_or_else(|| ReconcileError::UnknownEnvironment {
				env_id: job.env_id.clone(),
			})?;

		if record.status == EnvStatus::Deleted {
			tracing::info!("Environment already deleted, skipping provisioning");
			return Ok(ReconcileOutcome::AlreadyDeleted);
		}

		self.ensure_namespace(job).await?;
		self.ensure_deployment(job).await?;

		let app_url = match self.ensure_service(job).await? {
			ServiceState::Created => self.resolve_endpoint(job).await?,
			ServiceState::Existing => EXISTING_SERVICE.to_string(),
		};

		let commit = self.store.mark_ready(&job.env_id, &app_url).await?;
		match commit {
			UpdateOutcome::Applied => {
				tracing::info!(app_url = %app_url, "Environment ready");
			}
			UpdateOutcome::Unchanged => {
				tracing::debug!(app_url = %app_url, "Environment already past ready transition");
			}
		}

		Ok(ReconcileOutcome::Ready { app_url, commit })
	}

	async fn ensure_namespace(&self, job: &ProvisionJob) -> Result<(), ReconcileError> {
		match self.client.create_namespace(build_namespace(job)).await {
			Ok(_) => {
				tracing::debug!("Created namespace");
				Ok(())
			}
			Err(e) if e.is_already_exists() => {
				tracing::debug!("Namespace already exists");
				Ok(())
			}
			Err(source) => Err(ReconcileError::Cluster {
				step: "namespace",
				source,
			}),
		}
	}

	async fn ensure_deployment(&self, job: &ProvisionJob) -> Result<(), ReconcileError> {
		let deployment = build_deployment(job, &self.config);
		match self.client.create_deployment(&job.namespace, deployment).await {
			Ok(_) => {
				tracing::debug!(image = %job.image, "Created deployment");
				Ok(())
			}
			Err(e) if e.is_already_exists() => {
				tracing::debug!("Deployment already exists");
				Ok(())
			}
			Err(source) => Err(ReconcileError::Cluster {
				step: "deployment",
				source,
			}),
		}
	}

	async fn ensure_service(&self, job: &ProvisionJob) -> Result<ServiceState, ReconcileError> {
		let service = build_service(job, &self.config);
		match self.client.create_service(&job.namespace, service).await {
			Ok(_) => {
				tracing::debug!("Created service");
				Ok(ServiceState::Created)
			}
			Err(e) if e.is_already_exists() => {
				tracing::debug!("Service already exists");
				Ok(ServiceState::Existing)
			}
			Err(source) => Err(ReconcileError::Cluster {
				step: "service",
				source,
			}),
		}
	}

	/// Poll the service for a load-balancer hostname.
	///
	/// Makes at most `endpoint_max_attempts` reads, sleeping
	/// `endpoint_poll_interval` after each miss. Read errors count as misses.
	async fn resolve_endpoint(&self, job: &ProvisionJob) -> Result<String, ReconcileError> {
		let service_name = naming::service_name(&job.namespace);
		let attempts = self.config.endpoint_max_attempts;

		for attempt in 1..=attempts {
			match self.client.get_service(&service_name, &job.namespace).await {
				Ok(service) => {
					if let Some(hostname) = ingress_hostname(&service) {
						tracing::debug!(attempt, hostname = %hostname, "Load balancer endpoint assigned");
						return Ok(hostname);
					}
				}
				Err(K8sError::ServiceNotFound { .. }) => {
					tracing::warn!(attempt, "Service disappeared while waiting for endpoint");
				}
				Err(e) => {
					tracing::warn!(attempt, error = %e, "Failed to read service status");
				}
			}

			tokio::select! {
				_ = self.shutdown.cancelled() => return Err(ReconcileError::Cancelled),
				_ = tokio::time::sleep(self.config.endpoint_poll_interval) => {}
			}
		}

		tracing::info!(attempts, "No load balancer endpoint yet, recording placeholder");
		Ok(PENDING_ENDPOINT.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use kepod_server_db::{Environment, MemoryEnvironmentStore};
	use kepod_server_k8s::{MockK8sClient, MockOp};
	use std::time::Duration;

	async fn setup(status: EnvStatus) -> (Arc<MockK8sClient>, Arc<MemoryEnvironmentStore>, ProvisionJob) {
		let store = Arc::new(MemoryEnvironmentStore::new());
		let env = Environment {
			env_id: "e1".into(),
			name: "demo".into(),
			image: "nginx:1.27".into(),
			ttl: 3600,
			namespace: "demo-e1".into(),
			target_port: 80,
			status: EnvStatus::Queued,
			created_at: Utc::now(),
			app_url: None,
		};
		store.create(&env).await.unwrap();
		if status >= EnvStatus::Ready {
			store.mark_ready(&env.env_id, "old.example").await.unwrap();
		}
		if status == EnvStatus::Deleted {
			store
				.mark_deleted(&env.env_id, Utc::now() + chrono::Duration::hours(2))
				.await
				.unwrap();
		}
		(Arc::new(MockK8sClient::new()), store, ProvisionJob::from(&env))
	}

	fn reconciler(client: Arc<MockK8sClient>, repo: Arc<MemoryEnvironmentStore>) -> Reconciler {
		let config = ReconcilerConfig {
			endpoint_poll_interval: Duration::from_millis(10),
			endpoint_max_attempts: 3,
			..Default::default()
		};
		Reconciler::new(client, repo, config)
	}

	#[tokio::test]
	async fn creates_resources_and_records_hostname() {
		let (client, repo, job) = setup(EnvStatus::Queued).await;
		client.set_ingress("lb.example.com", 1);

		let outcome = reconciler(client.clone(), repo.clone())
			.reconcile(&job)
			.await
			.unwrap();

		assert_eq!(
			outcome,
			ReconcileOutcome::Ready {
				app_url: "lb.example.com".into(),
				commit: UpdateOutcome::Applied,
			}
		);
		assert!(client.has_namespace("demo-e1"));
		assert_eq!(client.deployment_count("demo-e1"), 1);
		assert_eq!(client.service_count("demo-e1"), 1);
		assert_eq!(client.get_service_calls(), 2);

		let env = repo.get("e1").await.unwrap().unwrap();
		assert_eq!(env.status, EnvStatus::Ready);
		assert_eq!(env.app_url.as_deref(), Some("lb.example.com"));
	}

	#[tokio::test(start_paused = true)]
	async fn records_pending_after_bounded_polls() {
		let (client, repo, job) = setup(EnvStatus::Queued).await;

		let outcome = reconciler(client.clone(), repo).reconcile(&job).await.unwrap();

		assert!(matches!(outcome, ReconcileOutcome::Ready { ref app_url, .. } if app_url == PENDING_ENDPOINT));
		assert_eq!(client.get_service_calls(), 3);
	}

	#[tokio::test]
	async fn existing_service_skips_polling() {
		let (client, repo, job) = setup(EnvStatus::Queued).await;
		let r = reconciler(client.clone(), repo);
		client.set_ingress("lb.example.com", 0);
		r.reconcile(&job).await.unwrap();
		let reads = client.get_service_calls();

		let again = r.reconcile(&job).await.unwrap();
		assert_eq!(
			again,
			ReconcileOutcome::Ready {
				app_url: EXISTING_SERVICE.into(),
				commit: UpdateOutcome::Unchanged,
			}
		);
		assert_eq!(client.get_service_calls(), reads);
	}

	#[tokio::test]
	async fn deleted_environment_is_not_reprovisioned() {
		let (client, repo, job) = setup(EnvStatus::Deleted).await;

		let outcome = reconciler(client.clone(), repo).reconcile(&job).await.unwrap();

		assert_eq!(outcome, ReconcileOutcome::AlreadyDeleted);
		assert_eq!(client.create_namespace_calls(), 0);
	}

	#[tokio::test]
	async fn unknown_environment_is_terminal() {
		let (client, repo, mut job) = setup(EnvStatus::Queued).await;
		job.env_id = "missing".into();

		let err = reconciler(client, repo).reconcile(&job).await.unwrap_err();
		assert!(err.is_terminal());
	}

	#[tokio::test]
	async fn cluster_failure_leaves_record_untouched() {
		let (client, repo, job) = setup(EnvStatus::Queued).await;
		client.fail(MockOp::CreateDeployment, "quota exceeded");

		let err = reconciler(client, repo.clone()).reconcile(&job).await.unwrap_err();

		assert!(matches!(err, ReconcileError::Cluster { step: "deployment", .. }));
		assert!(!err.is_terminal());
		assert_eq!(repo.get("e1").await.unwrap().unwrap().status, EnvStatus::Queued);
	}

	#[tokio::test(start_paused = true)]
	async fn shutdown_interrupts_endpoint_polling() {
		let (client, repo, job) = setup(EnvStatus::Queued).await;
		let token = CancellationToken::new();
		let r = reconciler(client, repo).with_shutdown(token.clone());
		token.cancel();

		let err = r.reconcile(&job).await.unwrap_err();
		assert!(matches!(err, ReconcileError::Cancelled));
	}
}
