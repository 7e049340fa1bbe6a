// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Expiry sweeper.
//!
//! One [`Sweeper::sweep`] call is one batch pass over `READY` environments.
//! Each expired environment is torn down on its own: archival signal (best
//! effort), namespace deletion, then the conditional `DELETED` write. A
//! failure on one environment is recorded and the pass moves on.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kepod_server_db::{EnvStatus, Environment, EnvironmentStore, UpdateOutcome};
use kepod_server_k8s::K8sClient;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::archive::ArchiveSignal;
use crate::error::SweepError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
	pub env_id: String,
	pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	/// `READY` records examined.
	pub scanned: usize,
	pub expired: usize,
	/// Records moved to `DELETED` by this pass.
	pub deleted: usize,
	/// Records whose `DELETED` write found them already moved on.
	pub unchanged: usize,
	pub archive_failures: usize,
	pub failures: Vec<SweepFailure>,
}

pub struct Sweeper {
	client: Arc<dyn K8sClient>,
	store: Arc<dyn EnvironmentStore>,
	archive: Arc<dyn ArchiveSignal>,
	running: Mutex<()>,
}

impl Sweeper {
	pub fn new(
		client: Arc<dyn K8sClient>,
		store: Arc<dyn EnvironmentStore>,
		archive: Arc<dyn ArchiveSignal>,
	) -> Self {
		Self {
			client,
			store,
			archive,
			running: Mutex::new(()),
		}
	}

	pub async fn sweep(&self) -> Result<SweepReport, SweepError> {
		self.sweep_at(Utc::now()).await
	}

	/// Sweep as if the current time were `now`. Passes never overlap; a call
	/// made while another is running fails with [`SweepError::AlreadyRunning`].
	#[tracing::instrument(skip(self))]
	pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
		let _running = self
			.running
			.try_lock()
			.map_err(|_| SweepError::AlreadyRunning)?;

		let ready = self
			.store
			.list(Some(EnvStatus::Ready))
			.await
			.map_err(SweepError::Store)?;

		let mut report = SweepReport {
			scanned: ready.len(),
			..Default::default()
		};

		for env in ready.iter().filter(|env| env.is_expired(now)) {
			report.expired += 1;
			self.teardown(env, now, &mut report).await;
		}

		tracing::info!(
			scanned = report.scanned,
			expired = report.expired,
			deleted = report.deleted,
			failed = report.failures.len(),
			"Sweep completed"
		);
		Ok(report)
	}

	#[tracing::instrument(
		skip(self, env, report),
		fields(env_id = %env.env_id, namespace = %env.namespace)
	)]
	async fn teardown(&self, env: &Environment, now: DateTime<Utc>, report: &mut SweepReport) {
		if let Err(e) = self.archive.signal(&env.env_id, &env.namespace).await {
			report.archive_failures += 1;
			tracing::warn!(error = %e, "Log archival signal failed, continuing teardown");
		}

		match self.client.delete_namespace(&env.namespace).await {
			Ok(()) => tracing::info!("Deleted namespace"),
			Err(e) if e.is_not_found() => tracing::debug!("Namespace already gone"),
			Err(e) => {
				tracing::error!(error = %e, "Failed to delete namespace");
				report.failures.push(SweepFailure {
					env_id: env.env_id.clone(),
					error: e.to_string(),
				});
				return;
			}
		}

		match self.store.mark_deleted(&env.env_id, now).await {
			Ok(UpdateOutcome::Applied) => report.deleted += 1,
			Ok(UpdateOutcome::Unchanged) => {
				tracing::debug!("Environment already past deleted transition");
				report.unchanged += 1;
			}
			Err(e) => {
				tracing::error!(error = %e, "Failed to mark environment deleted");
				report.failures.push(SweepFailure {
					env_id: env.env_id.clone(),
					error: e.to_string(),
				});
			}
		}
	}
}
