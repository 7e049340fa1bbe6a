// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Queue consumer that feeds provisioning jobs to the [`Reconciler`].
//!
//! A message is deleted only after its job reconciled (or was found to be
//! unprocessable). Anything else leaves it in the queue to be redelivered
//! once its visibility timeout lapses.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use kepod_server_db::{DbError, EnvironmentStore, JobQueue, QueueMessage};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::job::ProvisionJob;
use crate::reconciler::Reconciler;

/// What happened to one received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
	Acked,
	Retried,
	Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
	pub received: usize,
	pub acked: usize,
	pub retried: usize,
	pub discarded: usize,
}

impl BatchReport {
	fn record(&mut self, outcome: MessageOutcome) {
		match outcome {
			MessageOutcome::Acked => self.acked += 1,
			MessageOutcome::Retried => self.retried += 1,
			MessageOutcome::Discarded => self.discarded += 1,
		}
	}
}

pub struct QueueWorker {
	queue: Arc<dyn JobQueue>,
	store: Arc<dyn EnvironmentStore>,
	reconciler: Arc<Reconciler>,
	config: WorkerConfig,
}

impl QueueWorker {
	pub fn new(
		queue: Arc<dyn JobQueue>,
		store: Arc<dyn EnvironmentStore>,
		reconciler: Arc<Reconciler>,
		config: WorkerConfig,
	) -> Self {
		Self {
			queue,
			store,
			reconciler,
			config,
		}
	}

	/// Receive one batch and process it with bounded parallelism.
	pub async fn poll_once(&self) -> Result<BatchReport, DbError> {
		let messages = self
			.queue
			.receive(self.config.batch_size, self.config.visibility_timeout)
			.await?;

		let mut report = BatchReport {
			received: messages.len(),
			..Default::default()
		};
		if messages.is_empty() {
			return Ok(report);
		}

		let outcomes: Vec<MessageOutcome> = stream::iter(messages)
			.map(|message| self.process(message))
			.buffer_unordered(self.config.max_parallel.max(1))
			.collect()
			.await;
		for outcome in outcomes {
			report.record(outcome);
		}

		tracing::debug!(
			received = report.received,
			acked = report.acked,
			retried = report.retried,
			discarded = report.discarded,
			"Processed provisioning batch"
		);
		Ok(report)
	}

	/// Poll until `shutdown` is cancelled, sleeping `idle_poll` whenever the
	/// queue is empty or unreachable. An in-flight batch finishes first.
	pub async fn run(&self, shutdown: CancellationToken) {
		tracing::info!(
			batch_size = self.config.batch_size,
			max_parallel = self.config.max_parallel,
			"Starting provisioning worker"
		);

		while !shutdown.is_cancelled() {
			let idle = match self.poll_once().await {
				Ok(report) => report.received == 0,
				Err(e) => {
					tracing::error!(error = %e, "Failed to receive provisioning jobs");
					true
				}
			};

			if idle {
				tokio::select! {
					_ = shutdown.cancelled() => break,
					_ = tokio::time::sleep(self.config.idle_poll) => {}
				}
			}
		}

		tracing::info!("Provisioning worker stopped");
	}

	#[tracing::instrument(
		skip(self, message),
		fields(message_id = %message.id, receive_count = message.receive_count)
	)]
	async fn process(&self, message: QueueMessage) -> MessageOutcome {
		let job = match ProvisionJob::from_json(&message.body) {
			Ok(job) => job,
			Err(e) => {
				tracing::error!(error = %e, "Discarding malformed provisioning job");
				self.ack(&message).await;
				return MessageOutcome::Discarded;
			}
		};

		if let Err(e) = self.store.mark_pending(&job.env_id).await {
			tracing::warn!(env_id = %job.env_id, error = %e, "Failed to record pending status");
		}

		match self.reconciler.reconcile(&job).await {
			Ok(_) => {
				self.ack(&message).await;
				MessageOutcome::Acked
			}
			Err(e) if e.is_terminal() => {
				tracing::error!(env_id = %job.env_id, error = %e, "Discarding provisioning job");
				self.ack(&message).await;
				MessageOutcome::Discarded
			}
			Err(e) => {
				tracing::warn!(env_id = %job.env_id, error = %e, "Provisioning failed, leaving job for redelivery");
				MessageOutcome::Retried
			}
		}
	}

	async fn ack(&self, message: &QueueMessage) {
		match self.queue.delete(&message.receipt).await {
			Ok(true) => {}
			Ok(false) => {
				tracing::warn!("Receipt no longer valid, job may be redelivered");
			}
			Err(e) => {
				tracing::warn!(error = %e, "Failed to delete queue message");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ReconcilerConfig;
	use crate::submit::{submit, CreateEnvironment};
	use kepod_server_db::testing::create_test_pool;
	use kepod_server_db::{EnvStatus, EnvironmentRepository, QueueRepository};
	use kepod_server_k8s::{MockK8sClient, MockOp};
	use std::time::Duration;

	struct Harness {
		client: Arc<MockK8sClient>,
		store: Arc<EnvironmentRepository>,
		queue: Arc<QueueRepository>,
		worker: QueueWorker,
	}

	async fn harness() -> Harness {
		let pool = create_test_pool().await.unwrap();
		let client = Arc::new(MockK8sClient::new());
		client.set_ingress("lb.example.com", 0);
		let store = Arc::new(EnvironmentRepository::new(pool.clone()));
		let queue = Arc::new(QueueRepository::new(pool));
		let reconciler = Arc::new(Reconciler::new(
			client.clone(),
			store.clone(),
			ReconcilerConfig::default(),
		));
		let config = WorkerConfig {
			visibility_timeout: Duration::ZERO,
			..Default::default()
		};
		let worker = QueueWorker::new(queue.clone(), store.clone(), reconciler, config);
		Harness {
			client,
			store,
			queue,
			worker,
		}
	}

	fn request(name: &str) -> CreateEnvironment {
		CreateEnvironment {
			name: name.into(),
			image: "nginx:1.27".into(),
			ttl: 3600,
			target_port: 80,
		}
	}

	#[tokio::test]
	async fn successful_job_is_acknowledged() {
		let h = harness().await;
		let env = submit(h.store.as_ref(), h.queue.as_ref(), request("demo"))
			.await
			.unwrap();

		let report = h.worker.poll_once().await.unwrap();

		assert_eq!(report.acked, 1);
		assert_eq!(h.queue.depth().await.unwrap(), 0);
		let stored = h.store.get(&env.env_id).await.unwrap().unwrap();
		assert_eq!(stored.status, EnvStatus::Ready);
		assert_eq!(stored.app_url.as_deref(), Some("lb.example.com"));
	}

	#[tokio::test]
	async fn failed_job_stays_queued_until_it_succeeds() {
		let h = harness().await;
		let env = submit(h.store.as_ref(), h.queue.as_ref(), request("demo"))
			.await
			.unwrap();
		h.client.fail(MockOp::CreateNamespace, "apiserver unavailable");

		let report = h.worker.poll_once().await.unwrap();
		assert_eq!(report.retried, 1);
		assert_eq!(h.queue.depth().await.unwrap(), 1);
		let stored = h.store.get(&env.env_id).await.unwrap().unwrap();
		assert_eq!(stored.status, EnvStatus::Pending);

		h.client.clear_failure(MockOp::CreateNamespace);
		let report = h.worker.poll_once().await.unwrap();
		assert_eq!(report.acked, 1);
		assert_eq!(h.queue.depth().await.unwrap(), 0);
		assert_eq!(h.client.deployment_count(&env.namespace), 1);
	}

	#[tokio::test]
	async fn malformed_message_is_discarded() {
		let h = harness().await;
		h.queue.send("not json").await.unwrap();

		let report = h.worker.poll_once().await.unwrap();

		assert_eq!(report.discarded, 1);
		assert_eq!(h.queue.depth().await.unwrap(), 0);
		assert_eq!(h.client.create_namespace_calls(), 0);
	}

	#[tokio::test]
	async fn job_for_unknown_environment_is_discarded() {
		let h = harness().await;
		let job = ProvisionJob {
			env_id: "ghost".into(),
			env_name: "ghost".into(),
			image: "nginx".into(),
			ttl: 60,
			namespace: "ghost-1".into(),
			target_port: 80,
		};
		h.queue.send(&job.to_json().unwrap()).await.unwrap();

		let report = h.worker.poll_once().await.unwrap();

		assert_eq!(report.discarded, 1);
		assert_eq!(h.queue.depth().await.unwrap(), 0);
	}

	#[tokio::test]
	async fn run_stops_on_shutdown() {
		let h = harness().await;
		let token = CancellationToken::new();
		token.cancel();
		tokio::time::timeout(Duration::from_secs(5), h.worker.run(token))
			.await
			.expect("worker should stop once cancelled");
	}
}
