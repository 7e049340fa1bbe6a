// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use kepod_server_env::{SweepError, Sweeper};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Sweep once immediately, then every `interval` until `shutdown` fires.
///
/// A pass that overlaps an externally triggered sweep is skipped.
#[instrument(skip(sweeper, shutdown), fields(job_id = "env-sweep"))]
pub async fn run_sweep_task(sweeper: Arc<Sweeper>, interval: Duration, shutdown: CancellationToken) {
	tracing::info!(interval_secs = interval.as_secs(), "Starting periodic sweep task");

	loop {
		run_once(&sweeper).await;

		tokio::select! {
			_ = shutdown.cancelled() => break,
			_ = tokio::time::sleep(interval) => {}
		}
	}

	tracing::info!("Periodic sweep task stopped");
}

async fn run_once(sweeper: &Sweeper) {
	match sweeper.sweep().await {
		Ok(report) => {
			if report.expired > 0 || !report.failures.is_empty() {
				tracing::info!(
					scanned = report.scanned,
					expired = report.expired,
					deleted = report.deleted,
					failures = report.failures.len(),
					"Sweep completed"
				);
			} else {
				tracing::debug!(scanned = report.scanned, "Sweep found nothing to tear down");
			}
		}
		Err(SweepError::AlreadyRunning) => {
			tracing::debug!("Skipping sweep; another pass is running");
		}
		Err(e) => {
			tracing::error!(error = %e, "Sweep failed");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use kepod_server_db::{EnvStatus, Environment, EnvironmentStore, MemoryEnvironmentStore};
	use kepod_server_env::LocalArchiveSignal;
	use kepod_server_env::{FsObjectStore, LogArchiver, SubscriptionTable};
	use kepod_server_k8s::MockK8sClient;

	#[tokio::test]
	async fn task_sweeps_immediately_and_stops_on_shutdown() {
		let dir = tempfile::tempdir().unwrap();
		let client = Arc::new(MockK8sClient::new());
		let store = Arc::new(MemoryEnvironmentStore::new());
		let archiver = Arc::new(LogArchiver::new(
			dir.path().join("logs"),
			Arc::new(FsObjectStore::new(dir.path().join("objects"))),
			SubscriptionTable::new(),
		));
		let sweeper = Arc::new(Sweeper::new(
			client.clone(),
			store.clone(),
			Arc::new(LocalArchiveSignal::new(archiver)),
		));

		let env = Environment {
			env_id: "e1".into(),
			name: "web".into(),
			image: "nginx".into(),
			ttl: 0,
			namespace: "web-e1".into(),
			target_port: 80,
			status: EnvStatus::Queued,
			created_at: Utc::now() - chrono::Duration::seconds(5),
			app_url: None,
		};
		store.create(&env).await.unwrap();
		store.mark_ready("e1", "lb.example.com").await.unwrap();

		let shutdown = CancellationToken::new();
		let task = tokio::spawn(run_sweep_task(
			sweeper,
			Duration::from_secs(60),
			shutdown.clone(),
		));

		let mut status = EnvStatus::Ready;
		for _ in 0..100 {
			status = store.get("e1").await.unwrap().unwrap().status;
			if status == EnvStatus::Deleted {
				break;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		assert_eq!(status, EnvStatus::Deleted);

		shutdown.cancel();
		task.await.unwrap();
	}
}
